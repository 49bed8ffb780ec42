//! External process execution.
//!
//! Authentication shells out to the provider client (or to the container runtime
//! CLI). Every invocation goes through the [`ProcessRunner`] trait so it can be
//! scripted in tests.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from running an external process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The process could not be started.
    #[error("failed to spawn {program}: {reason}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Why it failed.
        reason: String,
    },

    /// The process did not finish within its time bound.
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Program that timed out.
        program: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program path or name.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory, if different from the current one.
    pub working_dir: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Hard time bound.
    pub timeout: Duration,
}

impl CommandSpec {
    /// Create a spec with a 10 second timeout and no overrides.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            env: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment override.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Render the command line for logs, replacing `secret` with a placeholder.
    #[must_use]
    pub fn display_redacted(&self, secret: &str) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|arg| {
            if !secret.is_empty() && arg == secret {
                "<redacted>".to_string()
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined and lower-cased, for phrase matching.
    #[must_use]
    pub fn combined_lowercase(&self) -> String {
        format!("{} {}", self.stdout, self.stderr).to_lowercase()
    }

    /// Returns true if either stream contains any of `phrases` (case-insensitive).
    #[must_use]
    pub fn contains_any(&self, phrases: &[&str]) -> bool {
        let text = self.combined_lowercase();
        phrases.iter().any(|p| text.contains(&p.to_lowercase()))
    }
}

/// Runs external processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the process cannot be started and
    /// `ProcessError::Timeout` if it outlives `spec.timeout`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// Runs processes with `tokio::process`.
///
/// A process that exceeds its timeout is abandoned: its output is discarded but
/// it is not killed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(ProcessError::Spawn {
                program: spec.program.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ProcessError::Timeout {
                program: spec.program.clone(),
                timeout: spec.timeout,
            }),
        }
    }
}

/// Scripted process runner for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// What a scripted command does when matched.
    #[derive(Debug, Clone)]
    pub enum MockOutcome {
        /// Finish with this output.
        Output(CommandOutput),
        /// Fail to spawn.
        SpawnError,
        /// Exceed the timeout.
        Timeout,
    }

    struct Rule {
        program: String,
        args_prefix: Vec<String>,
        outcome: MockOutcome,
        writes: Vec<(PathBuf, Vec<u8>)>,
    }

    impl Rule {
        fn matches(&self, spec: &CommandSpec) -> bool {
            spec.program == self.program && spec.args.starts_with(&self.args_prefix)
        }
    }

    /// A process runner that answers from a script.
    ///
    /// Rules are matched in insertion order on program and argument prefix.
    /// Unmatched commands fail to spawn, as if the program did not exist.
    #[derive(Default)]
    pub struct MockProcessRunner {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl MockProcessRunner {
        /// Create a runner with no rules.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a command to finish with `output`.
        pub fn respond(&self, program: &str, args_prefix: &[&str], output: CommandOutput) {
            self.push(program, args_prefix, MockOutcome::Output(output), Vec::new());
        }

        /// Script a command to write a file and then finish with `output`.
        pub fn respond_and_write(
            &self,
            program: &str,
            args_prefix: &[&str],
            output: CommandOutput,
            path: impl Into<PathBuf>,
            contents: &[u8],
        ) {
            self.push(
                program,
                args_prefix,
                MockOutcome::Output(output),
                vec![(path.into(), contents.to_vec())],
            );
        }

        /// Script a command to time out.
        pub fn time_out(&self, program: &str, args_prefix: &[&str]) {
            self.push(program, args_prefix, MockOutcome::Timeout, Vec::new());
        }

        /// Script a command to fail to spawn.
        pub fn fail_spawn(&self, program: &str, args_prefix: &[&str]) {
            self.push(program, args_prefix, MockOutcome::SpawnError, Vec::new());
        }

        /// Every command run so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().clone()
        }

        fn push(
            &self,
            program: &str,
            args_prefix: &[&str],
            outcome: MockOutcome,
            writes: Vec<(PathBuf, Vec<u8>)>,
        ) {
            self.rules.lock().push(Rule {
                program: program.to_string(),
                args_prefix: args_prefix.iter().map(ToString::to_string).collect(),
                outcome,
                writes,
            });
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
            self.calls.lock().push(spec.clone());

            let (outcome, writes) = {
                let rules = self.rules.lock();
                match rules.iter().find(|rule| rule.matches(spec)) {
                    Some(rule) => (rule.outcome.clone(), rule.writes.clone()),
                    None => (MockOutcome::SpawnError, Vec::new()),
                }
            };

            for (path, contents) in writes {
                std::fs::write(&path, contents).map_err(|e| ProcessError::Spawn {
                    program: spec.program.clone(),
                    reason: format!("scripted write to {} failed: {e}", path.display()),
                })?;
            }

            match outcome {
                MockOutcome::Output(output) => Ok(output),
                MockOutcome::SpawnError => Err(ProcessError::Spawn {
                    program: spec.program.clone(),
                    reason: "No such file or directory (os error 2)".to_string(),
                }),
                MockOutcome::Timeout => Err(ProcessError::Timeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                }),
            }
        }
    }
}
