//! Runs a command plan.
//!
//! Commands run strictly in order and the first failure stops the run.
//! Nothing is rolled back. A command is remote when its first non-blank
//! character is uppercase (a CL command) and a local shell command
//! otherwise.

use appinstall_common::archive;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command_runner::{CommandOptions, CommandRunner};
use crate::error::{InstallError, Result};
use crate::output::Output;
use crate::plan::{CommandPlan, Hook};
use crate::remote::RemoteSystem;

const LOCAL_LABEL: &str = "INSTALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Remote,
    Local,
}

pub fn classify(command: &str) -> CommandKind {
    match command.trim_start().chars().next() {
        Some(c) if c.is_uppercase() => CommandKind::Remote,
        _ => CommandKind::Local,
    }
}

/// Replace every `$PWD` with the install directory.
pub fn substitute_pwd(command: &str, install_dir: &Path) -> String {
    command.replace("$PWD", &install_dir.to_string_lossy())
}

/// Deletions are allowed to fail: the object may simply not exist yet.
pub fn is_ok_to_fail(command: &str) -> bool {
    command.trim().to_uppercase().starts_with("DLT")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: String,
    pub kind: CommandKind,
    pub state: CommandState,
}

/// Submit one CL command and print what it reported.
///
/// Id-less response messages are printed as they are; job log entries added
/// by the command are printed unless informational. Returns whether the
/// command succeeded; a failure is an error unless `ok_to_fail`.
pub fn run_remote<R: RemoteSystem + ?Sized>(
    remote: &mut R,
    command: &str,
    ok_to_fail: bool,
) -> Result<bool> {
    debug!(%command, "Running CL command");
    let baseline = match remote.job_log_len() {
        Ok(len) => Some(len),
        Err(err) => {
            debug!(%err, "Cannot read job log length");
            None
        }
    };

    let outcome = remote.submit(command)?;
    for message in outcome.messages.iter().filter(|m| m.id.is_none()) {
        Output::message(None, &message.text);
    }

    if let Some(baseline) = baseline {
        match remote.job_log_since(baseline) {
            Ok(entries) => {
                for entry in entries.iter().filter(|e| !e.informational) {
                    Output::message(Some(&entry.id), &entry.text);
                }
            }
            Err(err) => debug!(%err, "Cannot read job log"),
        }
    }

    if !outcome.success {
        if !ok_to_fail {
            return Err(InstallError::CommandFailed {
                command: command.to_string(),
                code: None,
            });
        }
        debug!(%command, "Command failed, continuing");
    }
    Ok(outcome.success)
}

/// Runs a [`CommandPlan`] between its hooks.
///
/// Holds the only borrow of the remote system for the whole run.
pub struct CommandExecutor<'a, R: RemoteSystem + ?Sized> {
    remote: &'a mut R,
    runner: &'a dyn CommandRunner,
    install_dir: PathBuf,
    shell: String,
    records: Vec<CommandRecord>,
}

impl<'a, R: RemoteSystem + ?Sized> CommandExecutor<'a, R> {
    pub fn new(
        remote: &'a mut R,
        runner: &'a dyn CommandRunner,
        install_dir: impl Into<PathBuf>,
        shell: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            runner,
            install_dir: install_dir.into(),
            shell: shell.into(),
            records: Vec::new(),
        }
    }

    /// State of every non-empty command of the last run.
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    pub fn execute(&mut self, plan: &CommandPlan) -> Result<()> {
        self.records = plan
            .commands
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| CommandRecord {
                command: c.clone(),
                kind: classify(c),
                state: CommandState::Pending,
            })
            .collect();

        if plan.has_hook(Hook::PreInstall) {
            self.run_hook(Hook::PreInstall)?;
        }

        Output::info("Performing installation...");
        for index in 0..self.records.len() {
            self.records[index].state = CommandState::Running;
            let result = self.run_command(index);
            self.records[index].state = match result {
                Ok(()) => CommandState::Succeeded,
                Err(_) => CommandState::Failed,
            };
            result?;
        }

        if plan.has_hook(Hook::PostInstall) {
            self.run_hook(Hook::PostInstall)?;
        }
        info!(commands = self.records.len(), "Plan executed");
        Ok(())
    }

    fn run_command(&mut self, index: usize) -> Result<()> {
        let record = &self.records[index];
        let command = substitute_pwd(&record.command, &self.install_dir);
        match record.kind {
            CommandKind::Remote => {
                run_remote(&mut *self.remote, &command, is_ok_to_fail(&command))?;
            }
            CommandKind::Local => {
                let command = command.trim();
                debug!(%command, "Running local command");
                let exit = self.runner.run_streaming(
                    &self.shell,
                    &["-c", command],
                    &CommandOptions::with_cwd(&self.install_dir),
                    &mut |source, line| Output::stream_line(LOCAL_LABEL, source, line),
                )?;
                if !exit.success() {
                    return Err(InstallError::CommandFailed {
                        command: command.to_string(),
                        code: exit.code,
                    });
                }
            }
        }
        Ok(())
    }

    fn run_hook(&self, hook: Hook) -> Result<()> {
        let script = self.install_dir.join(hook.file_name());
        let what = match hook {
            Hook::PreInstall => "pre-installation",
            Hook::PostInstall => "post-installation",
        };
        Output::info(format!("Executing {what} tasks..."));
        archive::set_executable(&script)?;

        let program = script.to_string_lossy();
        let exit = self.runner.run_streaming(
            &program,
            &[],
            &CommandOptions::with_cwd(&self.install_dir),
            &mut |source, line| Output::stream_line(hook.label(), source, line),
        )?;
        if !exit.success() {
            return Err(InstallError::HookFailed {
                hook: what.to_string(),
                code: exit.code,
            });
        }
        Output::success(format!("Successfully executed {what} tasks"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::RealCommandRunner;
    use crate::testing::{FakeRemote, RecordingRunner};
    use std::fs;

    fn plan(commands: &[&str]) -> CommandPlan {
        CommandPlan {
            commands: commands.iter().map(|c| c.to_string()).collect(),
            hooks: Default::default(),
        }
    }

    #[test]
    fn classification_follows_first_character() {
        assert_eq!(classify("CRTSAVF QTEMP/X"), CommandKind::Remote);
        assert_eq!(classify("   DLTLIB X"), CommandKind::Remote);
        assert_eq!(classify("/QOpenSys/usr/bin/tar xvf a -C /"), CommandKind::Local);
        assert_eq!(classify("echo hi"), CommandKind::Local);
        assert_eq!(classify(""), CommandKind::Local);
    }

    #[test]
    fn pwd_is_substituted_everywhere() {
        assert_eq!(
            substitute_pwd("X FROM('$PWD/a.lib') TO('$PWD/b')", Path::new("/tmp/i1")),
            "X FROM('/tmp/i1/a.lib') TO('/tmp/i1/b')"
        );
    }

    #[test]
    fn deletions_may_fail() {
        assert!(is_ok_to_fail("DLTLIB APP"));
        assert!(is_ok_to_fail("  dltobj x"));
        assert!(!is_ok_to_fail("RSTLIB SAVLIB(DLT)"));
    }

    #[test]
    fn runs_remote_commands_in_order_with_pwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new();
        let runner = RecordingRunner::new();
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "sh");
        executor
            .execute(&plan(&["CRTSAVF QTEMP/APP", "", "CPYFRMSTMF FROMSTMF('$PWD/APP.lib')"]))
            .unwrap();
        assert_eq!(executor.records().len(), 2);
        assert!(
            executor
                .records()
                .iter()
                .all(|r| r.state == CommandState::Succeeded)
        );

        assert_eq!(
            remote.submitted(),
            vec![
                "CRTSAVF QTEMP/APP".to_string(),
                format!("CPYFRMSTMF FROMSTMF('{}/APP.lib')", dir.path().display()),
            ]
        );
        assert!(runner.runs().is_empty());
    }

    #[test]
    fn failed_deletion_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new().failing("DLTLIB");
        let runner = RecordingRunner::new();
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "sh");
        executor
            .execute(&plan(&["DLTLIB APP", "RSTLIB SAVLIB(APP)"]))
            .unwrap();
        assert_eq!(remote.submitted().len(), 2);
    }

    #[test]
    fn other_failures_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new().failing("RSTLIB");
        let runner = RecordingRunner::new();
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "sh");
        let err = executor
            .execute(&plan(&["RSTLIB SAVLIB(APP)", "CRTSAVF QTEMP/NEXT"]))
            .unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { code: None, .. }));
        assert_eq!(executor.records()[0].state, CommandState::Failed);
        assert_eq!(executor.records()[1].state, CommandState::Pending);
        assert_eq!(remote.submitted(), vec!["RSTLIB SAVLIB(APP)"]);
    }

    #[test]
    fn job_log_failures_are_not_command_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new().with_broken_job_log();
        let runner = RecordingRunner::new();
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "sh");
        executor.execute(&plan(&["CRTSAVF QTEMP/APP"])).unwrap();
    }

    #[test]
    fn run_remote_reports_ok_to_fail_outcome() {
        let mut remote = FakeRemote::new()
            .failing("DLTLIB")
            .with_log("CRTSAVF", "CPC9801", "Object created.");
        assert!(!run_remote(&mut remote, "DLTLIB X", true).unwrap());
        assert!(run_remote(&mut remote, "CRTSAVF QTEMP/X", false).unwrap());
        assert!(run_remote(&mut remote, "DLTLIB X", false).is_err());
    }

    #[test]
    fn local_commands_run_through_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new();
        let runner = RecordingRunner::new();
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "/bin/sh");
        executor
            .execute(&plan(&["  tar xvf $PWD/files.tar -C / "]))
            .unwrap();

        let runs = runner.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].program, "/bin/sh");
        assert_eq!(
            runs[0].args,
            vec![
                "-c".to_string(),
                format!("tar xvf {}/files.tar -C /", dir.path().display())
            ]
        );
        assert_eq!(runs[0].cwd.as_deref(), Some(dir.path()));
    }

    #[test]
    fn local_failure_carries_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut remote = FakeRemote::new();
        let runner = RecordingRunner::new().exit_with("tar", 2);
        let mut executor = CommandExecutor::new(&mut remote, &runner, dir.path(), "sh");
        let err = executor
            .execute(&plan(&["tar xvf files.tar -C /", "CRTSAVF QTEMP/X"]))
            .unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { code: Some(2), .. }));
        assert!(remote.submitted().is_empty());
    }

    #[test]
    fn hooks_wrap_the_plan() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("order.log");
        fs::write(
            dir.path().join(".preinstall"),
            format!("#!/bin/sh\necho pre >> {}\n", log.display()),
        )
        .unwrap();
        fs::write(
            dir.path().join(".postinstall"),
            format!("#!/bin/sh\necho post >> {}\n", log.display()),
        )
        .unwrap();

        let command = format!("echo plan >> {}", log.display());
        let mut plan = plan(&[command.as_str()]);
        plan.hooks.insert(Hook::PreInstall);
        plan.hooks.insert(Hook::PostInstall);

        let mut remote = FakeRemote::new();
        let mut executor = CommandExecutor::new(&mut remote, &RealCommandRunner, dir.path(), "sh");
        executor.execute(&plan).unwrap();

        assert_eq!(fs::read_to_string(&log).unwrap(), "pre\nplan\npost\n");
    }

    #[test]
    fn failing_pre_hook_stops_before_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".preinstall"), "#!/bin/sh\nexit 4\n").unwrap();
        let mut plan = plan(&["CRTSAVF QTEMP/X"]);
        plan.hooks.insert(Hook::PreInstall);

        let mut remote = FakeRemote::new();
        let mut executor = CommandExecutor::new(&mut remote, &RealCommandRunner, dir.path(), "sh");
        let err = executor.execute(&plan).unwrap_err();
        assert!(matches!(err, InstallError::HookFailed { code: Some(4), .. }));
        assert!(remote.submitted().is_empty());
    }

    #[test]
    fn post_hook_skipped_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("post-ran");
        fs::write(
            dir.path().join(".postinstall"),
            format!("#!/bin/sh\ntouch {}\n", marker.display()),
        )
        .unwrap();
        let mut plan = plan(&["RSTLIB SAVLIB(APP)"]);
        plan.hooks.insert(Hook::PostInstall);

        let mut remote = FakeRemote::new().failing("RSTLIB");
        let mut executor = CommandExecutor::new(&mut remote, &RealCommandRunner, dir.path(), "sh");
        assert!(executor.execute(&plan).is_err());
        assert!(!marker.exists());
    }
}
