//! Runtime settings read from the environment.
//!
//! | Variable           | Default                    |
//! |--------------------|----------------------------|
//! | `APPINSTALL_HOME`  | `~/.appinstall`            |
//! | `APPINSTALL_TAR`   | `/QOpenSys/usr/bin/tar`    |
//! | `APPINSTALL_SHELL` | `/QOpenSys/usr/bin/sh`     |
//! | `APPINSTALL_QSH`   | `/QOpenSys/usr/bin/qsh`    |

use directories::BaseDirs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_TAR: &str = "/QOpenSys/usr/bin/tar";
pub const DEFAULT_SHELL: &str = "/QOpenSys/usr/bin/sh";
pub const DEFAULT_QSH: &str = "/QOpenSys/usr/bin/qsh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the per-run working directories.
    pub home: PathBuf,
    /// tar used by the generated unpack commands.
    pub tar: String,
    /// Shell for local commands.
    pub shell: String,
    /// Shell hosting the remote command session.
    pub qsh: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let home = non_empty("APPINSTALL_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_home);
        Self {
            home,
            tar: non_empty("APPINSTALL_TAR").unwrap_or_else(|| DEFAULT_TAR.to_string()),
            shell: non_empty("APPINSTALL_SHELL").unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            qsh: non_empty("APPINSTALL_QSH").unwrap_or_else(|| DEFAULT_QSH.to_string()),
        }
    }

    /// Settings rooted at `home` with default tool paths.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            tar: DEFAULT_TAR.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            qsh: DEFAULT_QSH.to_string(),
        }
    }

    pub fn builds_dir(&self) -> PathBuf {
        self.home.join("builds")
    }

    pub fn installs_dir(&self) -> PathBuf {
        self.home.join("installs")
    }

    /// A fresh staging directory path for one build. Not created here.
    pub fn new_build_dir(&self) -> PathBuf {
        run_dir(&self.builds_dir())
    }

    /// A fresh extraction directory path for one install. Not created here.
    pub fn new_install_dir(&self) -> PathBuf {
        run_dir(&self.installs_dir())
    }
}

fn default_home() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".appinstall")
}

/// 16 hex characters, unique per run.
pub fn run_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

fn run_dir(parent: &Path) -> PathBuf {
    parent.join(run_id())
}
