//! Derives the install command plan from a bundle's artifact list.
//!
//! Inference runs once, before anything is changed on the system. It only
//! reads: the archive listing and library existence go through a
//! [`SystemProbe`].

use std::path::Path;
use tracing::debug;

use crate::cl;
use crate::confirm::ConfirmMode;
use crate::error::{InstallError, Result};
use crate::plan::{ArtifactKind, CommandPlan, Confirmation, Impact};
use crate::remote::SystemProbe;

/// Runtime choices made by whoever runs the installer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub confirm: ConfirmMode,
    /// Restore libraries under this name instead of their saved name.
    pub rstlib: Option<String>,
    /// Storage pool number for restored libraries.
    pub rstasp: Option<String>,
    /// Storage pool device for restored libraries.
    pub rstaspdev: Option<String>,
    /// Let the bootstrap program perform the install.
    pub load_and_run: bool,
}

/// The plan together with what it will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inference {
    pub plan: CommandPlan,
    pub confirmation: Confirmation,
}

/// Turn the artifact list into commands, in artifact order.
///
/// Stream archives are unpacked with a local `tar` using the absolute path
/// of the extracted archive; everything else becomes remote commands that
/// refer to the install directory as `$PWD`.
pub fn infer_commands(
    files: &[String],
    options: &InstallOptions,
    install_dir: &Path,
    tar: &str,
    probe: &(impl SystemProbe + ?Sized),
) -> Result<Inference> {
    let mut plan = CommandPlan::new();
    let mut confirmation = Confirmation::default();

    for file in files {
        match ArtifactKind::classify(file) {
            ArtifactKind::StreamArchive => {
                let archive = install_dir.join(file);
                let quoted = shlex::try_quote(&archive.to_string_lossy())
                    .map_err(|_| {
                        InstallError::CorruptArchive(format!("unusable path {}", archive.display()))
                    })?
                    .into_owned();
                let entries = probe.list_archive_contents(&archive).map_err(|err| {
                    InstallError::CorruptArchive(format!("cannot list {file}: {err}"))
                })?;
                confirmation.add(Impact::StreamFiles { entries });
                plan.push(cl::untar(tar, &quoted));
            }
            ArtifactKind::LibrarySave { library: savlib } => {
                let rstlib = options
                    .rstlib
                    .clone()
                    .unwrap_or_else(|| savlib.clone())
                    .to_uppercase();
                if !options.load_and_run && probe.object_exists(&cl::library_path(&rstlib)) {
                    confirmation.add(Impact::LibraryReplaced {
                        library: rstlib.clone(),
                    });
                } else {
                    confirmation.add(Impact::LibraryInstalled {
                        library: rstlib.clone(),
                    });
                }

                plan.push(cl::create_save_file(&savlib));
                plan.push(cl::copy_from_stream_file(&format!("$PWD/{file}"), &savlib));
                if !options.load_and_run {
                    plan.push(cl::delete_library(&rstlib));
                    plan.push(cl::restore_library(
                        &savlib,
                        &rstlib,
                        options.rstasp.as_deref(),
                        options.rstaspdev.as_deref(),
                    ));
                }
            }
            ArtifactKind::Bootstrap => {
                if options.load_and_run {
                    confirmation.add(Impact::LoadAndRun);
                    plan.push(cl::create_save_file(cl::BOOTSTRAP_PROGRAM));
                    plan.push(cl::copy_from_stream_file(
                        &format!("$PWD/{file}"),
                        cl::BOOTSTRAP_PROGRAM,
                    ));
                    plan.push(cl::load_and_run());
                } else {
                    debug!(%file, "Bootstrap program ignored without load-and-run");
                }
            }
            ArtifactKind::Hook(hook) => {
                plan.hooks.insert(hook);
            }
            ArtifactKind::Other => debug!(%file, "No install action for artifact"),
        }
    }

    Ok(Inference { plan, confirmation })
}
