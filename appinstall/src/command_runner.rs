//! Abstraction over local process execution for testability.
//!
//! Local shell commands and install hooks run through the [`CommandRunner`]
//! trait. [`RealCommandRunner`] spawns the process and streams its output;
//! tests use [`RecordingRunner`](crate::testing::RecordingRunner).
//!
//! # Draining
//!
//! A child's stdout and stderr are read by two reader threads while the
//! calling thread forwards their lines to the caller. Both pipes are drained
//! before the exit status is collected, so a chatty child cannot block on a
//! full pipe. There is no timeout: a hung child hangs the run.

use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Exit of a finished process. `code` is `None` when it died from a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Options for command execution.
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
}

impl CommandOptions {
    /// Create options with a working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }
}

/// Trait for abstracting local process execution.
pub trait CommandRunner: Send + Sync {
    /// Run `program` and hand every output line to `on_line` as it arrives.
    fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
        on_line: &mut dyn FnMut(StreamSource, &str),
    ) -> io::Result<ProcessExit>;
}

/// Production implementation that delegates to [`std::process::Command`].
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
        on_line: &mut dyn FnMut(StreamSource, &str),
    ) -> io::Result<ProcessExit> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            if let Some(stdout) = stdout {
                let tx = tx.clone();
                scope.spawn(move || forward_lines(stdout, StreamSource::Stdout, tx));
            }
            if let Some(stderr) = stderr {
                let tx = tx.clone();
                scope.spawn(move || forward_lines(stderr, StreamSource::Stderr, tx));
            }
            drop(tx);
            for (source, line) in rx {
                on_line(source, &line);
            }
        });

        let status = child.wait()?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}

/// Send each line of `reader` down `tx` until EOF or the receiver goes away.
pub(crate) fn forward_lines<R: Read>(
    reader: R,
    source: StreamSource,
    tx: Sender<(StreamSource, String)>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send((source, line)).is_err() {
                    break;
                }
            }
        }
    }
}
