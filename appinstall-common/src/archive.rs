use crate::error::CommonError;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType};

/// Incremental writer for the stream-file archive.
///
/// The archive file is created by the first [`append`](TarStager::append) and
/// every later call adds to it, so a failure can be pinned on one input.
/// Entries are stored relative to `/` and unpack with `tar xvf .. -C /`.
pub struct TarStager {
    path: PathBuf,
    builder: Option<Builder<File>>,
    entries: usize,
}

impl TarStager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            builder: None,
            entries: 0,
        }
    }

    /// Number of entries written so far.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Add one file or directory. Directories are added without their
    /// contents; callers register descendants individually.
    pub fn append(&mut self, source: &Path) -> Result<(), CommonError> {
        let name = archive_name(source)?;
        let builder = match self.builder.take() {
            Some(builder) => builder,
            None => {
                let file = File::create(&self.path)?;
                let mut builder = Builder::new(file);
                builder.follow_symlinks(false);
                builder
            }
        };
        let builder = self.builder.insert(builder);

        let metadata = fs::symlink_metadata(source)?;
        let result = if metadata.is_dir() {
            builder.append_dir(&name, source)
        } else {
            builder.append_path_with_name(source, &name)
        };
        result.map_err(|err| {
            CommonError::Archive(format!("failed to add {}: {err}", source.display()))
        })?;
        self.entries += 1;
        Ok(())
    }

    /// Write the end-of-archive marker and close the file.
    pub fn finish(self) -> Result<PathBuf, CommonError> {
        if let Some(builder) = self.builder {
            let mut file = builder
                .into_inner()
                .map_err(|err| CommonError::Archive(err.to_string()))?;
            std::io::Write::flush(&mut file)?;
        }
        Ok(self.path)
    }
}

/// The name a path is stored under: the absolute path with its root removed.
pub fn archive_name(path: &Path) -> Result<PathBuf, CommonError> {
    let name: PathBuf = path
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect();
    if name.as_os_str().is_empty() {
        return Err(CommonError::Archive(format!(
            "cannot archive {}",
            path.display()
        )));
    }
    Ok(name)
}

/// List a tar archive without extracting it, one `tar tv`-style line per
/// entry: mode, size and path.
pub fn list_tar(path: &Path) -> Result<Vec<String>, CommonError> {
    let file = File::open(path)?;
    let mut archive = Archive::new(file);
    let mut lines = Vec::new();

    for entry in archive
        .entries()
        .map_err(|err| CommonError::Archive(err.to_string()))?
    {
        let entry = entry.map_err(|err| CommonError::Archive(err.to_string()))?;
        let header = entry.header();
        let entry_path = entry
            .path()
            .map_err(|err| CommonError::Archive(err.to_string()))?
            .to_path_buf();
        let mode = header.mode().unwrap_or(0);
        lines.push(format!(
            "{} {:>10} /{}",
            mode_string(header.entry_type(), mode),
            header.size().unwrap_or(0),
            entry_path.display()
        ));
    }

    Ok(lines)
}

fn mode_string(entry_type: EntryType, mode: u32) -> String {
    let kind = if entry_type.is_dir() {
        'd'
    } else if entry_type.is_symlink() {
        'l'
    } else {
        '-'
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

pub fn set_executable(path: &Path) -> Result<(), CommonError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}
