//! Google Managed Prometheus (GMP) toggle on the target cluster.
use tracing::{info, warn};

use crate::{
    error::Result,
    exec::{args, CommandRunner},
    locator::ClusterRef,
    prompt::{ask_yes_no, Prompt},
};

/// How to handle a cluster without managed metrics collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GmpPolicy {
    /// Ask the operator.
    #[default]
    Ask,
    /// Enable without asking.
    Enable,
    /// Leave it disabled without asking.
    Skip,
}

/// Managed metrics state after the toggle ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GmpState {
    /// The cluster already collected managed metrics.
    AlreadyEnabled,
    /// The driver enabled managed metrics.
    Enabled,
    /// The operator chose to continue without managed metrics.
    Declined,
}

impl GmpState {
    /// True when managed metrics are collected.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, GmpState::Declined)
    }
}

/// Query whether managed metrics collection is enabled.
pub async fn is_enabled(runner: &impl CommandRunner, cluster: &ClusterRef) -> Result<bool> {
    let mut query = cluster.gcloud_args("describe");
    query.extend(args([
        "--format=value(monitoringConfig.managedPrometheusConfig.enabled)",
    ]));
    let value = runner.output("gcloud", &query).await?;
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

/// Make sure managed metrics are enabled, unless the operator declines.
///
/// The update call returns once GKE accepted the change; the driver does not poll for it.
#[tracing::instrument(skip_all, fields(%cluster))]
pub async fn ensure(
    runner: &impl CommandRunner,
    prompt: &mut impl Prompt,
    cluster: &ClusterRef,
    policy: GmpPolicy,
) -> Result<GmpState> {
    if is_enabled(runner, cluster).await? {
        info!("managed prometheus already enabled");
        return Ok(GmpState::AlreadyEnabled);
    }

    let enable = match policy {
        GmpPolicy::Enable => true,
        GmpPolicy::Skip => false,
        GmpPolicy::Ask => ask_yes_no(
            prompt,
            "Managed Prometheus is not enabled on this cluster. Enable it now?",
        )?,
    };
    if !enable {
        warn!("continuing without managed prometheus, dashboards will stay empty");
        return Ok(GmpState::Declined);
    }

    let mut update = cluster.gcloud_args("update");
    update.extend(args(["--enable-managed-prometheus", "--quiet"]));
    runner.stream("gcloud", &update).await?;
    info!("managed prometheus enabled");
    Ok(GmpState::Enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exec::MockCommandRunner, locator::Location, prompt::test::Scripted};

    fn cluster() -> ClusterRef {
        ClusterRef {
            project: "demo-project".to_owned(),
            name: "loadtest".to_owned(),
            location: Location::Zone("us-central1-a".to_owned()),
        }
    }

    fn describe(runner: &mut MockCommandRunner, enabled: &'static str) {
        runner
            .expect_output()
            .withf(|program, args| program == "gcloud" && args[2] == "describe")
            .times(1)
            .returning(move |_, _| Ok(enabled.to_owned()));
    }

    #[tokio::test]
    async fn already_enabled_is_left_alone() {
        let mut runner = MockCommandRunner::new();
        describe(&mut runner, "True");
        runner.expect_stream().times(0);
        let mut prompt = Scripted::new([]);
        let state = ensure(&runner, &mut prompt, &cluster(), GmpPolicy::Ask)
            .await
            .unwrap();
        assert_eq!(state, GmpState::AlreadyEnabled);
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn consent_enables() {
        let mut runner = MockCommandRunner::new();
        describe(&mut runner, "");
        runner
            .expect_stream()
            .withf(|program, args| {
                program == "gcloud"
                    && args[2] == "update"
                    && args.iter().any(|a| a == "--enable-managed-prometheus")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let mut prompt = Scripted::new(["Y"]);
        let state = ensure(&runner, &mut prompt, &cluster(), GmpPolicy::Ask)
            .await
            .unwrap();
        assert_eq!(state, GmpState::Enabled);
    }

    #[tokio::test]
    async fn decline_is_not_an_error() {
        let mut runner = MockCommandRunner::new();
        describe(&mut runner, "False");
        runner.expect_stream().times(0);
        let mut prompt = Scripted::new(["n"]);
        let state = ensure(&runner, &mut prompt, &cluster(), GmpPolicy::Ask)
            .await
            .unwrap();
        assert_eq!(state, GmpState::Declined);
        assert!(!state.is_enabled());
    }

    #[tokio::test]
    async fn skip_policy_never_prompts() {
        let mut runner = MockCommandRunner::new();
        describe(&mut runner, "False");
        runner.expect_stream().times(0);
        let mut prompt = Scripted::new([]);
        let state = ensure(&runner, &mut prompt, &cluster(), GmpPolicy::Skip)
            .await
            .unwrap();
        assert_eq!(state, GmpState::Declined);
        assert!(prompt.asked.is_empty());
    }
}
