use crate::error::CommonError;
use serde::{Deserialize, Serialize};

/// Path of the serialized manifest inside a bundle payload.
pub const MANIFEST_ENTRY: &str = "APPINSTALL-INF/manifest.yml";

/// Path of the artifact checksum list inside a bundle payload.
pub const CHECKSUM_ENTRY: &str = "APPINSTALL-INF/SHA256SUMS";

/// Prefix under which every artifact's bytes are stored.
pub const DATA_PREFIX: &str = "APPINSTALL-DATA/";

/// Self-description of a bundle: the packaged artifacts and the commands the
/// builder recorded for them.
///
/// Both sequences keep their insertion order through serialization. Restore
/// order matters, so nothing here ever sorts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Artifact names, one per `APPINSTALL-DATA/` entry.
    pub files: Vec<String>,
    /// Commands in execution order.
    pub commands: Vec<String>,
}

impl Manifest {
    pub fn new(files: Vec<String>, commands: Vec<String>) -> Self {
        Self { files, commands }
    }

    /// Serialize to YAML with `files` before `commands`.
    pub fn to_yaml(&self) -> Result<String, CommonError> {
        serde_yaml::to_string(self).map_err(|err| CommonError::MalformedManifest(err.to_string()))
    }

    /// Parse a manifest.
    ///
    /// Only the shape is checked: both keys must be present and hold
    /// sequences of strings. Extra keys are ignored.
    pub fn from_yaml(content: &str) -> Result<Self, CommonError> {
        serde_yaml::from_str(content).map_err(|err| CommonError::MalformedManifest(err.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommonError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|err| CommonError::MalformedManifest(err.to_string()))?;
        Self::from_yaml(content)
    }

    /// Archive path of an artifact's bytes.
    pub fn data_entry(file: &str) -> String {
        format!("{DATA_PREFIX}{file}")
    }
}
