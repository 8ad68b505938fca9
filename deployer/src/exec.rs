//! Execution of the external command line tools (`gcloud`, `docker`, `which`).
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};

/// Define the behavior we consume from external command line tools.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and return its trimmed stdout.
    /// A non-zero exit status is an error.
    async fn output(&self, program: &str, args: &[String]) -> Result<String>;

    /// Run a command with the terminal attached so its progress is visible.
    /// A non-zero exit status is an error.
    async fn stream(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Runs commands as child processes of the driver.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> Result<String> {
        let cmd = command_line(program, args);
        debug!(%cmd, "running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| Error::CommandLaunch {
                cmd: cmd.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                cmd,
                status: describe_status(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    async fn stream(&self, program: &str, args: &[String]) -> Result<()> {
        let cmd = command_line(program, args);
        debug!(%cmd, "running command attached");
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| Error::CommandLaunch {
                cmd: cmd.clone(),
                source,
            })?;
        if !status.success() {
            return Err(Error::CommandFailed {
                cmd,
                status: describe_status(status),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

/// Owned argument list from string slices.
pub fn args<const N: usize>(list: [&str; N]) -> Vec<String> {
    list.into_iter().map(str::to_owned).collect()
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_args() {
        assert_eq!(
            command_line("gcloud", &args(["config", "get-value", "project"])),
            "gcloud config get-value project"
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let err = SystemRunner
            .output("loadgenctl-definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandLaunch { .. }), "{err:?}");
    }
}
