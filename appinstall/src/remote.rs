//! Remote command substrate.
//!
//! Builder and installer only see the [`RemoteSystem`] trait: submit a CL
//! command, read the job log incrementally, probe for objects and list an
//! archive. [`QshSystem`](crate::qsh::QshSystem) is the production
//! implementation; [`FakeRemote`](crate::testing::FakeRemote) backs the tests.

use appinstall_common::error::CommonError;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote session ended unexpectedly")]
    Disconnected,
    #[error("cannot submit command: {0}")]
    InvalidCommand(String),
    #[error("{0}")]
    Archive(#[from] CommonError),
}

/// A message returned directly by a submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message identifier such as `CPF2110`; `None` for free-form text.
    pub id: Option<String>,
    pub text: String,
}

impl Message {
    /// Parse an output line of the form `ABC1234: text`. Anything else is
    /// free-form text.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if let Some((id, text)) = trimmed.split_once(": ")
            && is_message_id(id)
        {
            return Self {
                id: Some(id.to_string()),
                text: text.trim().to_string(),
            };
        }
        Self {
            id: None,
            text: trimmed.to_string(),
        }
    }
}

fn is_message_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 7
        && bytes[..3].iter().all(|b| b.is_ascii_uppercase())
        && bytes[3..]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b))
}

/// Result of one submitted command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub messages: Vec<Message>,
}

/// One entry of the remote job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogEntry {
    pub id: String,
    pub text: String,
    pub informational: bool,
}

impl JobLogEntry {
    /// Build an entry from a message id; the third letter `I` marks an
    /// informational message.
    pub fn from_message(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            informational: id.as_bytes().get(2) == Some(&b'I'),
        }
    }
}

/// Read-only queries against the target system.
pub trait SystemProbe {
    /// Whether an integrated file system path exists.
    fn object_exists(&self, path: &str) -> bool;

    /// List an archive without extracting it.
    fn list_archive_contents(&self, path: &Path) -> Result<Vec<String>, RemoteError>;
}

/// The command channel to the target system.
pub trait RemoteSystem: SystemProbe {
    /// Run one CL command with full message capture.
    fn submit(&mut self, command: &str) -> Result<CommandOutcome, RemoteError>;

    /// Current number of entries in the job log.
    fn job_log_len(&mut self) -> Result<usize, RemoteError>;

    /// Job log entries appended at or after `offset`.
    fn job_log_since(&mut self, offset: usize) -> Result<Vec<JobLogEntry>, RemoteError>;

    /// Tear down every open service. Safe to call repeatedly.
    fn disconnect_all(&mut self);
}

/// Scoped use of a [`RemoteSystem`] for one build or install.
///
/// Dropping the connection disconnects, on success and on error alike.
pub struct Connection<'a, R: RemoteSystem + ?Sized> {
    system: &'a mut R,
}

impl<'a, R: RemoteSystem + ?Sized> Connection<'a, R> {
    pub fn open(system: &'a mut R) -> Self {
        debug!("Opening remote connection");
        Self { system }
    }
}

impl<R: RemoteSystem + ?Sized> Deref for Connection<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.system
    }
}

impl<R: RemoteSystem + ?Sized> DerefMut for Connection<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.system
    }
}

impl<R: RemoteSystem + ?Sized> Drop for Connection<'_, R> {
    fn drop(&mut self) {
        debug!("Disconnecting remote connection");
        self.system.disconnect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;

    #[test]
    fn parses_identified_messages() {
        let msg = Message::parse("CPF2110: Library MYLIB not found.");
        assert_eq!(msg.id.as_deref(), Some("CPF2110"));
        assert_eq!(msg.text, "Library MYLIB not found.");
    }

    #[test]
    fn hex_suffixes_are_identifiers() {
        assert_eq!(Message::parse("CPD0C2A: x").id.as_deref(), Some("CPD0C2A"));
    }

    #[test]
    fn free_form_lines_have_no_id() {
        let msg = Message::parse("  Note: something happened ");
        assert_eq!(msg.id, None);
        assert_eq!(msg.text, "Note: something happened");

        assert_eq!(Message::parse("cpf2110: lower").id, None);
    }

    #[test]
    fn informational_is_third_letter() {
        assert!(JobLogEntry::from_message("CPI2417", "x").informational);
        assert!(!JobLogEntry::from_message("CPF2110", "x").informational);
        assert!(!JobLogEntry::from_message("CPC2191", "x").informational);
    }

    #[test]
    fn connection_disconnects_on_drop() {
        let mut remote = FakeRemote::new();
        {
            let mut conn = Connection::open(&mut remote);
            conn.submit("CRTSAVF QTEMP/X").unwrap();
        }
        assert_eq!(remote.disconnects(), 1);
        assert_eq!(remote.submitted(), vec!["CRTSAVF QTEMP/X"]);
    }
}
