//! Collects components and writes a self-installing bundle.
//!
//! Building happens in two phases. The `add_*`/`set_*` calls only record
//! what to package. [`BundleBuilder::build`] then captures everything into a
//! staging directory (saving libraries through the remote system), writes
//! the manifest and appends the payload to a copy of this executable.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut builder = BundleBuilder::new(QshSystem::new("/QOpenSys/usr/bin/qsh"), Settings::from_env());
//! builder.add_file("/home/app")?;
//! builder.add_library("APPLIB")?;
//! builder.set_output("app-installer")?;
//! let bundle = builder.build()?;
//! ```

use appinstall_common::archive::TarStager;
use appinstall_common::bundle::{self, PayloadWriter};
use appinstall_common::manifest::Manifest;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cl;
use crate::components::ComponentSpec;
use crate::config::Settings;
use crate::error::{InstallError, Result};
use crate::executor::run_remote;
use crate::output::Output;
use crate::plan::{BOOTSTRAP_ARTIFACT, Hook, STREAM_ARCHIVE};
use crate::remote::{Connection, RemoteSystem};

pub struct BundleBuilder<R: RemoteSystem> {
    remote: R,
    settings: Settings,
    executable: Option<PathBuf>,
    files: BTreeSet<PathBuf>,
    libraries: BTreeSet<String>,
    hooks: BTreeMap<Hook, PathBuf>,
    load_and_run: Option<String>,
    output: Option<PathBuf>,
}

/// Artifacts captured so far and the install commands that go with them.
#[derive(Default)]
struct Staged {
    artifacts: Vec<(String, PathBuf)>,
    commands: Vec<String>,
}

impl Staged {
    fn artifact(&mut self, name: &str, path: PathBuf) {
        self.artifacts.push((name.to_string(), path));
    }

    fn command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }
}

impl<R: RemoteSystem> BundleBuilder<R> {
    pub fn new(remote: R, settings: Settings) -> Self {
        Self {
            remote,
            settings,
            executable: None,
            files: BTreeSet::new(),
            libraries: BTreeSet::new(),
            hooks: BTreeMap::new(),
            load_and_run: None,
            output: None,
        }
    }

    /// Use `path` as the installer image instead of the running executable.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Register a directory entry without its contents.
    pub fn add_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let not_a_directory = || InstallError::NotADirectory {
            path: path.display().to_string(),
        };
        let canonical = fs::canonicalize(path).map_err(|_| not_a_directory())?;
        if !canonical.is_dir() {
            return Err(not_a_directory());
        }
        debug!(path = %canonical.display(), "Adding directory");
        self.files.insert(canonical);
        Ok(())
    }

    /// Register a file, or a directory together with everything below it.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path).map_err(|_| InstallError::not_found(path))?;
        debug!(path = %canonical.display(), "Adding file");
        self.add_tree(canonical)
    }

    // Symlinks are recorded as links and never followed.
    fn add_tree(&mut self, path: PathBuf) -> Result<()> {
        let is_dir = fs::symlink_metadata(&path)?.is_dir();
        self.files.insert(path.clone());
        if is_dir {
            for entry in fs::read_dir(&path)? {
                self.add_tree(entry?.path())?;
            }
        }
        Ok(())
    }

    pub fn add_library(&mut self, name: &str) -> Result<()> {
        let library = name.trim().to_uppercase();
        let path = cl::library_path(&library);
        if !self.remote.object_exists(&path) {
            return Err(InstallError::NotFound { path });
        }
        if library.starts_with('Q') {
            return Err(InstallError::ReservedNamespace { name: library });
        }
        debug!(%library, "Adding library");
        self.libraries.insert(library);
        Ok(())
    }

    pub fn set_output(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.output.is_some() {
            return Err(InstallError::OutputAlreadySet);
        }
        self.output = Some(path.into());
        Ok(())
    }

    /// Install through the `QINSTAPP` program found in `library`.
    pub fn set_load_and_run_library(&mut self, library: &str) {
        self.load_and_run = Some(library.trim().to_uppercase());
    }

    pub fn set_hook(&mut self, hook: Hook, script: impl AsRef<Path>) -> Result<()> {
        let script = script.as_ref();
        if !script.is_file() {
            return Err(InstallError::not_found(script));
        }
        self.hooks.insert(hook, script.to_path_buf());
        Ok(())
    }

    /// Apply every component listed in a YAML component file.
    pub fn add_from_spec_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let spec = ComponentSpec::load(path.as_ref())?;
        for dir in &spec.directories {
            self.add_directory(dir)?;
        }
        for file in &spec.files {
            self.add_file(file)?;
        }
        for library in &spec.libraries {
            self.add_library(library)?;
        }
        if let Some(library) = &spec.lodrun {
            self.set_load_and_run_library(library);
        }
        if let Some(script) = &spec.preinstall {
            self.set_hook(Hook::PreInstall, script)?;
        }
        if let Some(script) = &spec.postinstall {
            self.set_hook(Hook::PostInstall, script)?;
        }
        Ok(())
    }

    /// Capture all components and write the bundle. Returns the bundle path.
    ///
    /// On failure the staging directory is kept for inspection.
    pub fn build(&mut self) -> Result<PathBuf> {
        let output = self.output.clone().ok_or(InstallError::NoOutputTarget)?;
        let stage = self.settings.new_build_dir();
        fs::create_dir_all(&stage)?;
        debug!(stage = %stage.display(), "Created staging directory");

        let mut staged = Staged::default();
        {
            let mut conn = Connection::open(&mut self.remote);
            stage_files(
                &self.files,
                &stage,
                self.load_and_run.is_some(),
                &self.settings.tar,
                &mut staged,
            )?;
            for library in &self.libraries {
                let restore = self.load_and_run.is_none();
                stage_library(&mut *conn, library, &stage, restore, &mut staged)?;
            }
            if let Some(library) = &self.load_and_run {
                stage_bootstrap(&mut *conn, library, &stage, &mut staged)?;
            }
        }
        for (hook, script) in &self.hooks {
            let target = stage.join(hook.file_name());
            fs::copy(script, &target)?;
            staged.artifact(hook.file_name(), target);
        }

        let manifest = Manifest::new(
            staged.artifacts.iter().map(|(name, _)| name.clone()).collect(),
            staged.commands,
        );
        let executable = match &self.executable {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };

        let spinner = Output::spinner(format!("Writing {}...", output.display()));
        match write_bundle(&stage, &manifest, &staged.artifacts, &executable, &output) {
            Ok(()) => spinner.finish_success(format!("Created {}", output.display())),
            Err(err) => {
                spinner.finish_error("Failed to write bundle");
                return Err(err);
            }
        }

        if let Err(err) = fs::remove_dir_all(&stage) {
            debug!(%err, stage = %stage.display(), "Cannot remove staging directory");
        }
        info!(bundle = %output.display(), artifacts = manifest.files.len(), "Bundle written");
        Ok(output)
    }
}

fn stage_files(
    files: &BTreeSet<PathBuf>,
    stage: &Path,
    load_and_run: bool,
    tar: &str,
    staged: &mut Staged,
) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    Output::info("Saving stream files...");
    let mut stager = TarStager::new(stage.join(STREAM_ARCHIVE));
    for file in files {
        stager
            .append(file)
            .map_err(InstallError::packaging(file.display().to_string()))?;
    }
    Output::step(format!("{} entries", stager.entry_count()));
    let archive = stager
        .finish()
        .map_err(InstallError::packaging(STREAM_ARCHIVE))?;

    staged.artifact(STREAM_ARCHIVE, archive);
    if !load_and_run {
        staged.command(cl::untar(tar, &format!("$PWD/{STREAM_ARCHIVE}")));
    }
    Ok(())
}

fn stage_library<R: RemoteSystem + ?Sized>(
    remote: &mut R,
    library: &str,
    stage: &Path,
    restore: bool,
    staged: &mut Staged,
) -> Result<()> {
    Output::info(format!("Saving library {library}..."));
    let name = format!("{library}.lib");
    let stream_file = stage.join(&name);
    run_remote(remote, &cl::create_save_file(library), false)?;
    run_remote(remote, &cl::save_library(library), false)?;
    run_remote(
        remote,
        &cl::copy_to_stream_file(library, &stream_file.to_string_lossy()),
        false,
    )?;

    staged.artifact(&name, stream_file);
    staged.command(cl::create_save_file(library));
    staged.command(cl::copy_from_stream_file(&format!("$PWD/{name}"), library));
    if restore {
        staged.command(cl::delete_library(library));
        staged.command(cl::restore_library(library, library, None, None));
    }
    Ok(())
}

fn stage_bootstrap<R: RemoteSystem + ?Sized>(
    remote: &mut R,
    library: &str,
    stage: &Path,
    staged: &mut Staged,
) -> Result<()> {
    Output::info(format!("Saving {} from {library}...", cl::BOOTSTRAP_PROGRAM));
    let program = cl::BOOTSTRAP_PROGRAM;
    let stream_file = stage.join(BOOTSTRAP_ARTIFACT);
    run_remote(remote, &cl::create_save_file(program), false)?;
    // The program is saved from QTEMP, so bring it there first.
    if library != cl::QTEMP {
        run_remote(remote, &cl::save_program(program, library), false)?;
        run_remote(remote, &cl::restore_program_to_qtemp(program, library), false)?;
        run_remote(remote, &cl::clear_save_file(program), false)?;
    }
    run_remote(remote, &cl::save_program(program, cl::QTEMP), false)?;
    run_remote(
        remote,
        &cl::copy_to_stream_file(program, &stream_file.to_string_lossy()),
        false,
    )?;

    staged.artifact(BOOTSTRAP_ARTIFACT, stream_file);
    staged.command(cl::create_save_file(program));
    staged.command(cl::copy_from_stream_file(
        &format!("$PWD/{BOOTSTRAP_ARTIFACT}"),
        program,
    ));
    staged.command(cl::load_and_run());
    Ok(())
}

fn write_bundle(
    stage: &Path,
    manifest: &Manifest,
    artifacts: &[(String, PathBuf)],
    executable: &Path,
    output: &Path,
) -> Result<()> {
    let mut payload = PayloadWriter::create(stage.join("payload.zip"))
        .map_err(InstallError::packaging("payload"))?;
    payload
        .add_manifest(manifest)
        .map_err(InstallError::packaging("manifest"))?;
    for (name, path) in artifacts {
        payload
            .add_artifact(name, path)
            .map_err(InstallError::packaging(name.as_str()))?;
    }
    let payload = payload.finish().map_err(InstallError::packaging("payload"))?;
    bundle::assemble(executable, &payload, output)
        .map_err(InstallError::packaging(output.display().to_string()))
}
