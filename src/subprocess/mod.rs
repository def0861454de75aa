//! Process execution abstraction
//!
//! Operations shell out for git and for the user's transformation script.
//! Everything goes through the [`ProcessRunner`] trait so tests can swap in
//! a scripted runner and assert on the exact commands issued.

pub mod git;

pub use git::GitCli;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{command} exited with status {code}: {stderr}")]
    ExitCode {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// One command to run: program, args, extra environment, working directory.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// `program arg arg…`, for error messages and logs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, failing on a non-zero exit status.
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// Real runner over `tokio::process`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        debug!(command = %command.display_line(), "running process");

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);
        cmd.envs(&command.env);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| ProcessError::Spawn {
            command: command.display_line(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ProcessOutput { stdout, stderr })
        } else {
            Err(ProcessError::ExitCode {
                command: command.display_line(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

/// Shared handle to a process runner, injected into operations.
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(TokioProcessRunner))
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    pub async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.runner.run(command).await
    }

    pub fn git(&self) -> GitCli {
        GitCli::new(Arc::clone(&self.runner))
    }

    #[cfg(test)]
    pub fn mock() -> (Self, Arc<MockProcessRunner>) {
        let mock = Arc::new(MockProcessRunner::new());
        let runner = Arc::clone(&mock) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }
}

/// Scripted runner for tests: records every invocation, succeeds with empty
/// output unless a matching failure has been queued.
#[cfg(test)]
pub struct MockProcessRunner {
    invocations: std::sync::Mutex<Vec<ProcessCommand>>,
    failures: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            invocations: std::sync::Mutex::new(Vec::new()),
            failures: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Fail any command whose display line contains `needle`.
    pub fn fail_matching(&self, needle: &str, stderr: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), stderr.to_string()));
    }

    /// Display lines of every command run so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(ProcessCommand::display_line)
            .collect()
    }

    pub fn invocations(&self) -> Vec<ProcessCommand> {
        self.invocations.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let line = command.display_line();
        self.invocations.lock().unwrap().push(command);

        let failures = self.failures.lock().unwrap();
        if let Some((_, stderr)) = failures.iter().find(|(needle, _)| line.contains(needle)) {
            return Err(ProcessError::ExitCode {
                command: line,
                code: 1,
                stderr: stderr.clone(),
            });
        }

        Ok(ProcessOutput {
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_runner_records_commands() {
        let (processes, mock) = SubprocessManager::mock();
        processes
            .run(ProcessCommand::new("git").args(["status", "--porcelain"]))
            .await
            .unwrap();

        assert_eq!(mock.command_lines(), ["git status --porcelain"]);
    }

    #[tokio::test]
    async fn mock_runner_scripts_failures() {
        let (processes, mock) = SubprocessManager::mock();
        mock.fail_matching("push", "remote rejected");

        let err = processes
            .run(ProcessCommand::new("git").args(["push", "origin", "main"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::ExitCode { code: 1, .. }));

        processes
            .run(ProcessCommand::new("git").arg("fetch"))
            .await
            .unwrap();
    }

    #[test]
    fn display_line_joins_program_and_args() {
        let cmd = ProcessCommand::new("git")
            .args(["clone", "url"])
            .current_dir("/tmp");
        assert_eq!(cmd.display_line(), "git clone url");
    }
}
