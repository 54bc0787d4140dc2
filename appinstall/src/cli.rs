//! CLI argument definitions.
//!
//! The same binary has two command lines: [`BuildCli`] when it runs as a
//! plain executable and [`InstallCli`] when it carries a bundle payload.

use clap::Parser;
use std::path::PathBuf;

use crate::builder::BundleBuilder;
use crate::confirm::ConfirmMode;
use crate::error::Result;
use crate::inference::InstallOptions;
use crate::plan::Hook;
use crate::remote::RemoteSystem;

#[derive(Debug, Parser)]
#[command(name = "appinstall")]
#[command(about = "Build a self-installing application bundle")]
#[command(version)]
pub struct BuildCli {
    /// File to write the bundle to
    #[arg(short, long, value_name = "FILE")]
    pub output: Vec<PathBuf>,

    /// Library to include (repeatable)
    #[arg(long = "qsys", value_name = "LIB")]
    pub libraries: Vec<String>,

    /// Directory to include without its contents (repeatable)
    #[arg(long = "dir", value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// File or directory tree to include (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// YAML file listing components to include (repeatable)
    #[arg(long = "spec", value_name = "FILE")]
    pub specs: Vec<PathBuf>,

    /// Install by running QINSTAPP from this library
    #[arg(long, value_name = "LIB")]
    pub lodrun: Option<String>,

    /// Script to run before installing
    #[arg(long, value_name = "SCRIPT")]
    pub preinstall: Option<PathBuf>,

    /// Script to run after a successful install
    #[arg(long, value_name = "SCRIPT")]
    pub postinstall: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildCli {
    /// Register every requested component with `builder`.
    pub fn configure<R: RemoteSystem>(&self, builder: &mut BundleBuilder<R>) -> Result<()> {
        for output in &self.output {
            builder.set_output(output)?;
        }
        for spec in &self.specs {
            builder.add_from_spec_file(spec)?;
        }
        for dir in &self.directories {
            builder.add_directory(dir)?;
        }
        for file in &self.files {
            builder.add_file(file)?;
        }
        for library in &self.libraries {
            builder.add_library(library)?;
        }
        if let Some(library) = &self.lodrun {
            builder.set_load_and_run_library(library);
        }
        if let Some(script) = &self.preinstall {
            builder.set_hook(Hook::PreInstall, script)?;
        }
        if let Some(script) = &self.postinstall {
            builder.set_hook(Hook::PostInstall, script)?;
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
#[command(name = "appinstall")]
#[command(about = "Install the application packaged in this file")]
#[command(version)]
pub struct InstallCli {
    /// Continue without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Ask for confirmation only if something will be deleted
    #[arg(short = 'c', long, conflicts_with = "yes")]
    pub continue_non_destructive: bool,

    /// Restore libraries under this name
    #[arg(long, value_name = "LIB")]
    pub rstlib: Option<String>,

    /// Auxiliary storage pool number for restored libraries
    #[arg(long, value_name = "ASP")]
    pub rstasp: Option<String>,

    /// Auxiliary storage pool device for restored libraries
    #[arg(long, value_name = "DEVICE")]
    pub rstaspdev: Option<String>,

    /// Let the packaged QINSTAPP program perform the install
    #[arg(long)]
    pub lodrun: bool,

    /// Show debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl InstallCli {
    pub fn options(&self) -> InstallOptions {
        let confirm = if self.yes {
            ConfirmMode::Always
        } else if self.continue_non_destructive {
            ConfirmMode::NonDestructive
        } else {
            ConfirmMode::Interactive
        };
        InstallOptions {
            confirm,
            rstlib: self.rstlib.as_deref().map(|lib| lib.trim().to_uppercase()),
            rstasp: self.rstasp.clone(),
            rstaspdev: self.rstaspdev.clone(),
            load_and_run: self.lodrun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::InstallError;
    use crate::testing::FakeRemote;
    use clap::CommandFactory;

    #[test]
    fn build_cli_is_well_formed() {
        BuildCli::command().debug_assert();
        InstallCli::command().debug_assert();
    }

    #[test]
    fn repeated_flags_accumulate() {
        let cli = BuildCli::parse_from([
            "appinstall",
            "-o",
            "out",
            "--qsys",
            "A",
            "--qsys",
            "B",
            "--file",
            "/x",
            "--dir",
            "/y",
        ]);
        assert_eq!(cli.output, vec![PathBuf::from("out")]);
        assert_eq!(cli.libraries, vec!["A", "B"]);
        assert_eq!(cli.files, vec![PathBuf::from("/x")]);
        assert_eq!(cli.directories, vec![PathBuf::from("/y")]);
    }

    #[test]
    fn second_output_is_rejected_by_builder() {
        let dir = tempfile::tempdir().unwrap();
        let cli = BuildCli::parse_from(["appinstall", "-o", "a", "--output", "b"]);
        let mut builder =
            BundleBuilder::new(FakeRemote::new(), Settings::with_home(dir.path()));
        assert!(matches!(
            cli.configure(&mut builder),
            Err(InstallError::OutputAlreadySet)
        ));
    }

    #[test]
    fn install_flags_map_to_options() {
        let cli = InstallCli::parse_from([
            "appinstall",
            "-c",
            "--rstlib",
            " apptest ",
            "--rstasp",
            "2",
        ]);
        let options = cli.options();
        assert_eq!(options.confirm, ConfirmMode::NonDestructive);
        assert_eq!(options.rstlib.as_deref(), Some("APPTEST"));
        assert_eq!(options.rstasp.as_deref(), Some("2"));
        assert!(!options.load_and_run);

        let cli = InstallCli::parse_from(["appinstall", "-y", "--lodrun"]);
        let options = cli.options();
        assert_eq!(options.confirm, ConfirmMode::Always);
        assert!(options.load_and_run);

        assert_eq!(
            InstallCli::parse_from(["appinstall"]).options().confirm,
            ConfirmMode::Interactive
        );
    }

    #[test]
    fn yes_conflicts_with_continue() {
        assert!(InstallCli::try_parse_from(["appinstall", "-y", "-c"]).is_err());
    }
}
