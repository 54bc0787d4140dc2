//! Error taxonomy shared by the builder and the installer.

use appinstall_common::error::CommonError;
use thiserror::Error;

use crate::remote::RemoteError;

pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("'{path}' does not exist")]
    NotFound { path: String },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: String },

    #[error("library {name} is not allowed: names starting with 'Q' are reserved")]
    ReservedNamespace { name: String },

    #[error("output file set more than once")]
    OutputAlreadySet,

    #[error("output file not specified")]
    NoOutputTarget,

    #[error("invalid package manifest: {0}")]
    MalformedManifest(String),

    #[error("error running command '{command}'{}", exit_suffix(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("{hook} tasks failed{}", exit_suffix(.code))]
    HookFailed { hook: String, code: Option<i32> },

    #[error("error processing packaged data: {0}")]
    CorruptArchive(String),

    #[error("canceled by user")]
    CanceledByUser,

    #[error("invalid component spec {path}: {message}")]
    InvalidSpec { path: String, message: String },

    #[error("error packaging {what}: {source}")]
    Packaging {
        what: String,
        #[source]
        source: CommonError,
    },

    #[error("remote system error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit status {code})"),
        None => String::new(),
    }
}

impl InstallError {
    pub fn not_found(path: impl AsRef<std::path::Path>) -> Self {
        InstallError::NotFound {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn packaging(what: impl Into<String>) -> impl FnOnce(CommonError) -> Self {
        let what = what.into();
        move |source| InstallError::Packaging { what, source }
    }

    /// A deliberate stop rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, InstallError::CanceledByUser)
    }
}

impl From<CommonError> for InstallError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Io(io) => InstallError::Io(io),
            CommonError::MalformedManifest(message) => InstallError::MalformedManifest(message),
            other => InstallError::CorruptArchive(other.to_string()),
        }
    }
}
