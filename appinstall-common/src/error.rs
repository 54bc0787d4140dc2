use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),
    #[error("bundle entry missing: {0}")]
    MissingEntry(String),
}

impl From<zip::result::ZipError> for CommonError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => CommonError::Io(io),
            other => CommonError::Archive(other.to_string()),
        }
    }
}
