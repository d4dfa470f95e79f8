//! Command execution
//!
//! Every external tool (docker, docker-compose, git, ssh-keyscan, vault,
//! the backup scripts) is invoked through the [`ProcessRunner`] trait so
//! tests can substitute a fake and assert on the constructed argument
//! vectors without touching real binaries.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// How the child's stdout/stderr are handled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream to the operator's terminal (the default for docker output)
    #[default]
    Inherit,
    /// Capture stdout for the caller
    Capture,
    /// Discard both streams
    Quiet,
}

/// A fully-described subprocess invocation
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub output: OutputMode,
}

impl ProcessRequest {
    pub fn new<S, I>(program: &str, args: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: BTreeMap::new(),
            output: OutputMode::Inherit,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn capture(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.output = OutputMode::Quiet;
        self
    }
}

/// Result of a completed subprocess
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// Exit code; -1 when the process was killed by a signal
    pub code: i32,
    /// Captured stdout; empty unless [`OutputMode::Capture`] was requested
    pub stdout: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Blocking (one-at-a-time) external process execution
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput>;
}

/// Runs the request and maps a non-zero exit to [`Error::CommandFailed`]
pub async fn run_checked(
    runner: &dyn ProcessRunner,
    request: ProcessRequest,
) -> Result<ProcessOutput> {
    let program = request.program.clone();
    let output = runner.run(request).await?;
    if !output.success() {
        return Err(Error::CommandFailed {
            program,
            code: output.code,
        });
    }
    Ok(output)
}

/// Production runner backed by `tokio::process`
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput> {
        debug!(program = %request.program, args = ?request.args, "running command");

        let mut command = Command::new(&request.program);
        command.args(&request.args);
        if let Some(ref dir) = request.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let spawn_err = |source| Error::Spawn {
            program: request.program.clone(),
            source,
        };

        match request.output {
            OutputMode::Capture => {
                command.stdout(Stdio::piped());
                let output = command.output().await.map_err(spawn_err)?;
                Ok(ProcessOutput {
                    code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                })
            }
            OutputMode::Quiet => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
                let status = command.status().await.map_err(spawn_err)?;
                Ok(ProcessOutput {
                    code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                })
            }
            OutputMode::Inherit => {
                let status = command.status().await.map_err(spawn_err)?;
                Ok(ProcessOutput {
                    code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                })
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_runner_captures_stdout() {
        let output = SystemRunner
            .run(ProcessRequest::new("echo", ["hello"]).capture())
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_system_runner_reports_spawn_failure() {
        let result = SystemRunner
            .run(ProcessRequest::new("nonexistent_command_12345", Vec::<String>::new()))
            .await;
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_run_checked_maps_nonzero_exit() {
        let runner = testing::RecordingRunner::new();
        runner.push_output(3, "");
        let err = run_checked(&runner, ProcessRequest::new("docker", ["ps"]))
            .await
            .unwrap_err();
        match err {
            Error::CommandFailed { program, code } => {
                assert_eq!(program, "docker");
                assert_eq!(code, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
