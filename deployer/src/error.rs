use std::{io, time::Duration};

/// Errors produced while driving the cluster.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external tool is not installed.
    #[error("required tool '{tool}' was not found on PATH")]
    MissingTool {
        /// Name of the missing executable.
        tool: String,
    },

    /// gcloud has no active project.
    #[error("no active gcloud project, set one with `gcloud config set project <id>`")]
    ProjectUnset,

    /// No cluster name was given.
    #[error("a cluster name is required")]
    MissingClusterName,

    /// The cluster location was neither given nor detected.
    #[error("could not determine the zone or region of cluster '{cluster}'")]
    MissingLocation {
        /// The cluster being located.
        cluster: String,
    },

    /// A resource created by deploy is missing.
    #[error("{what} does not exist, run `loadgenctl deploy` first")]
    NotDeployed {
        /// The missing resource, e.g. `namespace loadgen`.
        what: String,
    },

    /// A readiness wait ran out of time.
    #[error("deployment {namespace}/{name} was not ready within {}s", .timeout.as_secs())]
    Timeout {
        /// Namespace of the deployment.
        namespace: String,
        /// Deployment name.
        name: String,
        /// The bound that expired.
        timeout: Duration,
    },

    /// An external command could not be started.
    #[error("failed to execute '{cmd}': {source}")]
    CommandLaunch {
        /// The command line.
        cmd: String,
        /// Why spawning failed.
        #[source]
        source: io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("command '{cmd}' failed ({status}): {stderr}")]
    CommandFailed {
        /// The command line.
        cmd: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The Kubernetes API failed.
    #[error("Kube error: {source}")]
    Kube {
        /// The client or API error.
        #[from]
        source: kube::Error,
    },

    /// Watching a resource for a condition failed.
    #[error("Wait error: {source}")]
    Wait {
        /// The watch error.
        #[from]
        source: kube::runtime::wait::Error,
    },

    /// A record could not be converted.
    #[error("JSON error: {source}")]
    Json {
        /// The serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Terminal input or output failed.
    #[error("I/O error: {source}")]
    Io {
        /// The terminal error.
        #[from]
        source: io::Error,
    },
}

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How an operator should react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// A precondition or bound was violated, rerunning without changes fails again.
    Fatal,
    /// A transport or API failure, rerunning the same command may succeed.
    Retryable,
}

impl Error {
    /// Classify the error.
    pub fn severity(&self) -> Severity {
        match self {
            Error::MissingTool { .. }
            | Error::ProjectUnset
            | Error::MissingClusterName
            | Error::MissingLocation { .. }
            | Error::NotDeployed { .. }
            | Error::Timeout { .. }
            | Error::CommandLaunch { .. }
            | Error::Json { .. } => Severity::Fatal,
            Error::CommandFailed { .. }
            | Error::Kube { .. }
            | Error::Wait { .. }
            | Error::Io { .. } => {
                Severity::Retryable
            }
        }
    }

    /// True when the Kubernetes API reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source } if is_not_found(source))
    }
}

/// True when a kube error is a NotFound API response.
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.reason == "NotFound" || resp.code == 404)
}

#[cfg(test)]
mod tests {
    use kube::error::ErrorResponse;

    use super::*;

    #[test]
    fn timeout_message_mentions_seconds() {
        let err = Error::Timeout {
            namespace: "loadgen".to_owned(),
            name: "loadgen".to_owned(),
            timeout: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "deployment loadgen/loadgen was not ready within 300s"
        );
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn not_found_is_detected() {
        let err = Error::from(kube::Error::Api(ErrorResponse {
            status: "Failure".to_owned(),
            message: "namespaces \"loadgen\" not found".to_owned(),
            reason: "NotFound".to_owned(),
            code: 404,
        }));
        assert!(err.is_not_found());
        assert_eq!(err.severity(), Severity::Retryable);
    }
}
