//! Component lists read from a YAML file with `--spec`.
//!
//! ```yaml
//! directories:
//!   - /home/app/logs
//! files:
//!   - /home/app/bin
//!   - conf/app.yaml        # relative to this file
//! libraries:
//!   - APPLIB
//! lodrun: APPLIB           # optional
//! preinstall: stop.sh      # optional
//! postinstall: start.sh    # optional
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InstallError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentSpec {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub lodrun: Option<String>,
    pub preinstall: Option<PathBuf>,
    pub postinstall: Option<PathBuf>,
}

impl ComponentSpec {
    /// Read a component file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => InstallError::not_found(path),
            _ => InstallError::Io(err),
        })?;
        let spec: ComponentSpec =
            serde_yaml::from_str(&text).map_err(|err| InstallError::InvalidSpec {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(spec.resolved_against(base))
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.directories = self.directories.into_iter().map(resolve).collect();
        self.files = self.files.into_iter().map(resolve).collect();
        self.preinstall = self.preinstall.map(resolve);
        self.postinstall = self.postinstall.map(resolve);
        self
    }
}
