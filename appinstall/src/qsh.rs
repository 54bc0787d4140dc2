//! Production [`RemoteSystem`] backed by one long-lived `qsh` session.
//!
//! Every command runs as `system -i` inside the same shell, so the whole
//! build or install shares one job and one `QTEMP` library.

use crate::command_runner::{StreamSource, forward_lines};
use crate::remote::{CommandOutcome, JobLogEntry, Message, RemoteError, RemoteSystem, SystemProbe};
use appinstall_common::archive;
use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::debug;

const SENTINEL: &str = "__APPINSTALL_RC__";

struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<(StreamSource, String)>,
    readers: Vec<JoinHandle<()>>,
}

impl Session {
    fn start(program: &str, env: &[(String, String)]) -> Result<Self, RemoteError> {
        debug!(%program, "Starting shell session");
        let mut cmd = Command::new(program);
        cmd.env("QIBM_QSH_CMD_OUTPUT", "STDOUT")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn()?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                forward_lines(stdout, StreamSource::Stdout, tx)
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || {
                forward_lines(stderr, StreamSource::Stderr, tx)
            }));
        }

        Ok(Self {
            stdin: child.stdin.take(),
            child,
            lines: rx,
            readers,
        })
    }

    fn close(mut self) {
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) => debug!(code = ?status.code(), "Shell session ended"),
            Err(err) => debug!(%err, "Failed to reap shell session"),
        }
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
    }
}

/// Runs CL commands through `qsh` on the local host.
pub struct QshSystem {
    program: String,
    env: Vec<(String, String)>,
    session: Option<Session>,
    job_log: Vec<JobLogEntry>,
}

impl QshSystem {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            env: Vec::new(),
            session: None,
            job_log: Vec::new(),
        }
    }

    /// Extra environment for the shell process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn session(&mut self) -> Result<&mut Session, RemoteError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => Session::start(&self.program, &self.env)?,
        };
        Ok(self.session.insert(session))
    }
}

impl SystemProbe for QshSystem {
    fn object_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn list_archive_contents(&self, path: &Path) -> Result<Vec<String>, RemoteError> {
        Ok(archive::list_tar(path)?)
    }
}

impl RemoteSystem for QshSystem {
    fn submit(&mut self, command: &str) -> Result<CommandOutcome, RemoteError> {
        let quoted = shlex::try_quote(command)
            .map_err(|_| RemoteError::InvalidCommand(command.to_string()))?;
        debug!(%command, "Submitting command");

        let session = self.session()?;
        let stdin = session.stdin.as_mut().ok_or(RemoteError::Disconnected)?;
        writeln!(
            stdin,
            "system -i {quoted}; rc=$?; \
             printf '\\n%s %s\\n' {SENTINEL} \"$rc\"; \
             printf '\\n%s %s\\n' {SENTINEL} \"$rc\" 1>&2"
        )
        .map_err(|_| RemoteError::Disconnected)?;
        stdin.flush().map_err(|_| RemoteError::Disconnected)?;

        let mut messages = Vec::new();
        let mut logged = Vec::new();
        let mut rc = None;
        let mut sentinels = 0;
        while sentinels < 2 {
            let (source, line) = session
                .lines
                .recv()
                .map_err(|_| RemoteError::Disconnected)?;
            // Output without a trailing newline shares its line with the sentinel.
            let (text, code) = match line.find(SENTINEL) {
                Some(pos) => (&line[..pos], Some(&line[pos + SENTINEL.len()..])),
                None => (line.as_str(), None),
            };
            if !text.trim().is_empty() {
                let message = Message::parse(text);
                if let Some(id) = &message.id {
                    logged.push(JobLogEntry::from_message(id, &message.text));
                }
                messages.push(message);
            }
            if let Some(code) = code {
                sentinels += 1;
                if source == StreamSource::Stdout {
                    rc = code.trim().parse::<i32>().ok();
                }
            }
        }

        self.job_log.extend(logged);
        Ok(CommandOutcome {
            success: rc == Some(0),
            messages,
        })
    }

    fn job_log_len(&mut self) -> Result<usize, RemoteError> {
        Ok(self.job_log.len())
    }

    fn job_log_since(&mut self, offset: usize) -> Result<Vec<JobLogEntry>, RemoteError> {
        Ok(self
            .job_log
            .get(offset..)
            .map(<[JobLogEntry]>::to_vec)
            .unwrap_or_default())
    }

    fn disconnect_all(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

impl Drop for QshSystem {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
