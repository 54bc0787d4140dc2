//! Install mode: extract a bundle, confirm, run.

use appinstall_common::bundle::Bundle;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command_runner::CommandRunner;
use crate::config::Settings;
use crate::confirm::{self, Prompter};
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::inference::{InstallOptions, infer_commands};
use crate::output::Output;
use crate::remote::{Connection, RemoteSystem};

pub struct Installer<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
}

impl<'a> Installer<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            settings,
            runner,
            prompter,
        }
    }

    /// Extract every artifact of `bundle` into a fresh install directory.
    pub fn extract(&self, bundle: &mut Bundle) -> Result<PathBuf> {
        let install_dir = self.settings.new_install_dir();
        fs::create_dir_all(&install_dir)?;
        let install_dir = fs::canonicalize(&install_dir)?;
        debug!(dir = %install_dir.display(), "Extracting bundle");

        let extracted = bundle.extract_all(&install_dir)?;
        for path in &extracted {
            Output::step(path.display().to_string());
        }
        Output::success("Extraction phase complete");
        Ok(install_dir)
    }

    /// Run the full install of `bundle` against `remote`.
    pub fn install<R: RemoteSystem + ?Sized>(
        &self,
        bundle: &mut Bundle,
        options: &InstallOptions,
        remote: &mut R,
    ) -> Result<PathBuf> {
        let install_dir = self.extract(bundle)?;
        self.install_extracted(&bundle.manifest().files, &install_dir, options, remote)?;
        Ok(install_dir)
    }

    /// Infer, confirm and execute for artifacts already in `install_dir`.
    pub fn install_extracted<R: RemoteSystem + ?Sized>(
        &self,
        files: &[String],
        install_dir: &Path,
        options: &InstallOptions,
        remote: &mut R,
    ) -> Result<()> {
        let mut conn = Connection::open(remote);
        let inference =
            infer_commands(files, options, install_dir, &self.settings.tar, &*conn)?;
        Output::blank();
        print!("{}", inference.confirmation);
        Output::blank();
        confirm::gate(options.confirm, &inference.confirmation, self.prompter)?;

        let mut executor =
            CommandExecutor::new(&mut *conn, self.runner, install_dir, &self.settings.shell);
        executor.execute(&inference.plan)?;

        info!(dir = %install_dir.display(), "Installation complete");
        Output::success("Installation complete");
        Ok(())
    }
}
