//! Checks that the external tools are installed before anything is mutated.
use tracing::{debug, error};

use crate::{
    error::{Error, Result},
    exec::CommandRunner,
};

/// Tools the deploy pipeline shells out to or tells the operator to use.
pub const DEPLOY_TOOLS: [&str; 3] = ["gcloud", "kubectl", "docker"];
/// Tools configure, cleanup and status need before talking to the cluster.
pub const CLUSTER_TOOLS: [&str; 1] = ["kubectl"];
/// Tools image removal shells out to.
pub const IMAGE_TOOLS: [&str; 2] = ["gcloud", "docker"];

/// Fail on the first tool that cannot be resolved on PATH.
pub async fn check_tools(runner: &impl CommandRunner, tools: &[&str]) -> Result<()> {
    for tool in tools {
        match runner.output("which", &[tool.to_string()]).await {
            Ok(path) => debug!(tool, %path, "found tool"),
            Err(err) => {
                error!(tool, %err, "required tool is missing");
                return Err(Error::MissingTool {
                    tool: tool.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandRunner;

    fn which(runner: &mut MockCommandRunner, tool: &'static str, found: bool) {
        runner
            .expect_output()
            .withf(move |program, args| program == "which" && args == [tool])
            .times(1)
            .returning(move |_, _| {
                if found {
                    Ok(format!("/usr/bin/{tool}"))
                } else {
                    Err(Error::CommandFailed {
                        cmd: format!("which {tool}"),
                        status: "exit code 1".to_owned(),
                        stderr: String::new(),
                    })
                }
            });
    }

    #[tokio::test]
    async fn all_tools_present() {
        let mut runner = MockCommandRunner::new();
        for tool in DEPLOY_TOOLS {
            which(&mut runner, tool, true);
        }
        check_tools(&runner, &DEPLOY_TOOLS).await.unwrap();
    }

    #[tokio::test]
    async fn cluster_commands_only_need_kubectl() {
        let mut runner = MockCommandRunner::new();
        which(&mut runner, "kubectl", true);
        check_tools(&runner, &CLUSTER_TOOLS).await.unwrap();

        let mut runner = MockCommandRunner::new();
        which(&mut runner, "kubectl", false);
        let err = check_tools(&runner, &CLUSTER_TOOLS).await.unwrap_err();
        assert!(
            matches!(&err, Error::MissingTool { tool } if tool == "kubectl"),
            "{err:?}"
        );
        assert_eq!(err.severity(), crate::Severity::Fatal);
    }

    #[tokio::test]
    async fn image_removal_needs_docker() {
        let mut runner = MockCommandRunner::new();
        which(&mut runner, "gcloud", true);
        which(&mut runner, "docker", false);
        let err = check_tools(&runner, &IMAGE_TOOLS).await.unwrap_err();
        assert!(
            matches!(&err, Error::MissingTool { tool } if tool == "docker"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn stops_at_first_missing_tool() {
        let mut runner = MockCommandRunner::new();
        which(&mut runner, "gcloud", true);
        which(&mut runner, "kubectl", false);
        // docker is never looked up
        let err = check_tools(&runner, &DEPLOY_TOOLS).await.unwrap_err();
        assert!(
            matches!(&err, Error::MissingTool { tool } if tool == "kubectl"),
            "{err:?}"
        );
    }
}
