//! In-memory stand-ins for the remote system, the local process runner and
//! the prompt. Used by unit tests and the integration tests.

use appinstall_common::archive;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::command_runner::{CommandOptions, CommandRunner, ProcessExit, StreamSource};
use crate::confirm::Prompter;
use crate::error::Result;
use crate::remote::{CommandOutcome, JobLogEntry, Message, RemoteError, RemoteSystem, SystemProbe};

/// A scripted remote system.
///
/// Commands succeed unless they start with a registered failing prefix.
/// `CPYTOSTMF ... TOSTMF('<path>')` writes a placeholder save file to
/// `<path>` so builds produce real artifacts.
#[derive(Debug, Default)]
pub struct FakeRemote {
    objects: BTreeSet<String>,
    archives: HashMap<String, Option<Vec<String>>>,
    failing: Vec<String>,
    scripted_log: Vec<(String, JobLogEntry)>,
    job_log: Vec<JobLogEntry>,
    broken_job_log: bool,
    submitted: Vec<String>,
    disconnects: usize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an integrated file system path exist.
    pub fn with_object(mut self, path: &str) -> Self {
        self.objects.insert(path.to_string());
        self
    }

    /// Fix the listing returned for archives named `file_name`.
    pub fn with_archive(mut self, file_name: &str, lines: &[&str]) -> Self {
        self.archives.insert(
            file_name.to_string(),
            Some(lines.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    /// Make listing archives named `file_name` fail.
    pub fn with_broken_archive(mut self, file_name: &str) -> Self {
        self.archives.insert(file_name.to_string(), None);
        self
    }

    /// Fail every command starting with `prefix`.
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    /// Append a job log entry whenever a command starting with `prefix` runs.
    pub fn with_log(mut self, prefix: &str, id: &str, text: &str) -> Self {
        self.scripted_log
            .push((prefix.to_string(), JobLogEntry::from_message(id, text)));
        self
    }

    /// Make every job log read fail.
    pub fn with_broken_job_log(mut self) -> Self {
        self.broken_job_log = true;
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects
    }

    fn materialize_stream_file(command: &str) -> Result<(), RemoteError> {
        let Some(start) = command.find("TOSTMF('") else {
            return Ok(());
        };
        let rest = &command[start + "TOSTMF('".len()..];
        if let Some(end) = rest.find('\'') {
            let path = Path::new(&rest[..end]);
            fs::write(path, format!("SAVF {command}\n"))?;
        }
        Ok(())
    }
}

impl SystemProbe for FakeRemote {
    fn object_exists(&self, path: &str) -> bool {
        self.objects.contains(path)
    }

    fn list_archive_contents(&self, path: &Path) -> Result<Vec<String>, RemoteError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.archives.get(&name) {
            Some(Some(lines)) => Ok(lines.clone()),
            Some(None) => Err(RemoteError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "truncated archive",
            ))),
            None => Ok(archive::list_tar(path)?),
        }
    }
}

impl RemoteSystem for FakeRemote {
    fn submit(&mut self, command: &str) -> Result<CommandOutcome, RemoteError> {
        self.submitted.push(command.to_string());
        for (prefix, entry) in &self.scripted_log {
            if command.starts_with(prefix.as_str()) {
                self.job_log.push(entry.clone());
            }
        }

        if self.failing.iter().any(|p| command.starts_with(p.as_str())) {
            self.job_log
                .push(JobLogEntry::from_message("CPF9999", "Function check."));
            return Ok(CommandOutcome {
                success: false,
                messages: vec![Message {
                    id: None,
                    text: format!("{command} failed"),
                }],
            });
        }

        if command.starts_with("CPYTOSTMF") {
            Self::materialize_stream_file(command)?;
        }
        Ok(CommandOutcome {
            success: true,
            messages: Vec::new(),
        })
    }

    fn job_log_len(&mut self) -> Result<usize, RemoteError> {
        if self.broken_job_log {
            return Err(RemoteError::Disconnected);
        }
        Ok(self.job_log.len())
    }

    fn job_log_since(&mut self, offset: usize) -> Result<Vec<JobLogEntry>, RemoteError> {
        if self.broken_job_log {
            return Err(RemoteError::Disconnected);
        }
        Ok(self
            .job_log
            .get(offset..)
            .map(<[JobLogEntry]>::to_vec)
            .unwrap_or_default())
    }

    fn disconnect_all(&mut self) {
        self.disconnects += 1;
    }
}

/// One call seen by [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// A local runner that records calls instead of spawning processes.
///
/// Every run prints one stdout line and exits 0, unless its arguments contain
/// a substring registered with [`exit_with`](RecordingRunner::exit_with).
#[derive(Debug, Default)]
pub struct RecordingRunner {
    runs: Mutex<Vec<RecordedRun>>,
    exits: Vec<(String, i32)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit_with(mut self, needle: &str, code: i32) -> Self {
        self.exits.push((needle.to_string(), code));
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().map(|runs| runs.clone()).unwrap_or_default()
    }
}

impl CommandRunner for RecordingRunner {
    fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
        on_line: &mut dyn FnMut(StreamSource, &str),
    ) -> io::Result<ProcessExit> {
        let run = RecordedRun {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: options.cwd.clone(),
        };
        let code = self
            .exits
            .iter()
            .find(|(needle, _)| {
                run.program.contains(needle.as_str())
                    || run.args.iter().any(|a| a.contains(needle.as_str()))
            })
            .map_or(0, |(_, code)| *code);
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(run);
        }
        on_line(StreamSource::Stdout, "ok");
        Ok(ProcessExit { code: Some(code) })
    }
}

/// Answers prompts from a fixed list; once exhausted every answer is "no".
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<bool>>,
    asked: Cell<usize>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}
