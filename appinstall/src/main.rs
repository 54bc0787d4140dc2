use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use appinstall::builder::BundleBuilder;
use appinstall::command_runner::RealCommandRunner;
use appinstall::config::Settings;
use appinstall::confirm::TerminalPrompter;
use appinstall::installer::Installer;
use appinstall::output::Output;
use appinstall::qsh::QshSystem;
use appinstall::{BuildCli, InstallCli, InstallError};
use appinstall_common::bundle::Bundle;

/// `RUST_LOG` wins; otherwise `-v` turns on debug output for this crate.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "appinstall=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(cli: BuildCli, settings: Settings) -> Result<()> {
    let remote = QshSystem::new(&settings.qsh);
    let mut builder = BundleBuilder::new(remote, settings);
    cli.configure(&mut builder)?;
    let bundle = builder.build()?;
    tracing::debug!(bundle = %bundle.display(), "Build finished");
    Ok(())
}

fn install(cli: InstallCli, settings: Settings, mut bundle: Bundle) -> Result<()> {
    let prompter = TerminalPrompter;
    let runner = RealCommandRunner;
    let installer = Installer::new(&settings, &runner, &prompter);
    let mut remote = QshSystem::new(&settings.qsh);
    installer.install(&mut bundle, &cli.options(), &mut remote)?;
    Ok(())
}

fn run() -> Result<()> {
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    let settings = Settings::from_env();

    // A payload on our own executable means we are a bundle.
    let bundle = Bundle::open(&exe)
        .map_err(InstallError::from)
        .context("bundle payload is damaged")?;

    match bundle {
        Some(bundle) => {
            let cli = InstallCli::parse();
            init_tracing(cli.verbose);
            tracing::debug!(exe = %exe.display(), "Running in install mode");
            install(cli, settings, bundle)
        }
        None => {
            let cli = BuildCli::parse();
            init_tracing(cli.verbose);
            tracing::debug!(exe = %exe.display(), "Running in build mode");
            build(cli, settings)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err
                .downcast_ref::<InstallError>()
                .is_some_and(InstallError::is_cancellation)
            {
                Output::info(err.to_string());
            } else {
                Output::error(format!("error: {err:#}"));
            }
            ExitCode::FAILURE
        }
    }
}
