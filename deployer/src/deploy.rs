//! The deploy pipeline: tools, cluster, managed metrics, image, manifests, readiness.
use std::{fmt, path::PathBuf, time::Duration};

use clap::Args;
use kube::Client;
use tracing::info;

use crate::{
    apply::apply_all,
    cluster::{Cluster, KubeCluster},
    error::Result,
    exec::CommandRunner,
    gmp::{self, GmpPolicy, GmpState},
    image,
    locator::{fetch_credentials, locate, ClusterRef, Overrides},
    names::{
        GRAFANA_ADMIN_PASSWORD, GRAFANA_ADMIN_USER, GRAFANA_APP, GRAFANA_PORT, LOADGEN_APP,
        LOADGEN_NAMESPACE, METRICS_PORT, MONITORING_NAMESPACE,
    },
    prereq::{check_tools, DEPLOY_TOOLS},
    prompt::{ask_yes_no, Prompt},
    readiness::{wait_all_available, DEFAULT_TIMEOUT},
};

/// Options for the deploy command.
#[derive(Args, Clone, Debug)]
pub struct Opts {
    /// Target cluster selection.
    #[command(flatten)]
    pub cluster: Overrides,

    /// Enable Google Managed Prometheus without asking when it is off.
    #[arg(long, env = "LOADGEN_ENABLE_GMP", conflicts_with = "skip_gmp")]
    pub enable_gmp: bool,

    /// Leave Google Managed Prometheus off without asking.
    #[arg(long, env = "LOADGEN_SKIP_GMP")]
    pub skip_gmp: bool,

    /// Directory holding the load generator Dockerfile.
    #[arg(long, env = "LOADGEN_BUILD_CONTEXT", default_value = ".")]
    pub build_context: PathBuf,

    /// Seconds to wait for each deployment to become available.
    #[arg(long, env = "LOADGEN_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Run the smoke check without asking.
    #[arg(long, env = "LOADGEN_YES")]
    pub yes: bool,
}

impl Opts {
    /// How to treat a cluster without managed metrics.
    pub fn gmp_policy(&self) -> GmpPolicy {
        match (self.enable_gmp, self.skip_gmp) {
            (true, _) => GmpPolicy::Enable,
            (false, true) => GmpPolicy::Skip,
            (false, false) => GmpPolicy::Ask,
        }
    }
}

/// Everything resolved before the cluster is touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prepared {
    /// The target cluster.
    pub cluster: ClusterRef,
    /// Managed metrics state.
    pub gmp: GmpState,
    /// Registry path of the pushed image.
    pub image: String,
}

impl fmt::Display for Prepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deployed to {}", self.cluster)?;
        writeln!(f, "  image: {}", self.image)?;
        writeln!(
            f,
            "  managed prometheus: {}",
            if self.gmp.is_enabled() {
                "enabled"
            } else {
                "disabled, dashboards will stay empty"
            }
        )?;
        writeln!(f, "Grafana:")?;
        writeln!(
            f,
            "  kubectl -n {MONITORING_NAMESPACE} port-forward svc/{GRAFANA_APP} \
             {GRAFANA_PORT}:{GRAFANA_PORT}"
        )?;
        writeln!(
            f,
            "  open http://localhost:{GRAFANA_PORT} and log in as \
             {GRAFANA_ADMIN_USER}/{GRAFANA_ADMIN_PASSWORD}"
        )?;
        writeln!(f, "Load generator metrics:")?;
        writeln!(
            f,
            "  kubectl -n {LOADGEN_NAMESPACE} port-forward svc/{LOADGEN_APP} \
             {METRICS_PORT}:{METRICS_PORT}"
        )?;
        write!(f, "  curl http://localhost:{METRICS_PORT}/metrics")
    }
}

/// Resolve the cluster, settle managed metrics and publish the image.
#[tracing::instrument(skip_all)]
pub async fn prepare(
    runner: &impl CommandRunner,
    prompt: &mut impl Prompt,
    opts: &Opts,
) -> Result<Prepared> {
    check_tools(runner, &DEPLOY_TOOLS).await?;
    let cluster = locate(runner, prompt, &opts.cluster).await?;
    info!(%cluster, "target cluster");
    fetch_credentials(runner, &cluster).await?;
    let gmp = gmp::ensure(runner, prompt, &cluster, opts.gmp_policy()).await?;
    let image = image::build_and_push(runner, &cluster.project, &opts.build_context).await?;
    Ok(Prepared {
        cluster,
        gmp,
        image,
    })
}

/// Run the whole pipeline against the cluster selected by the fetched credentials.
pub async fn run(
    runner: &impl CommandRunner,
    prompt: &mut impl Prompt,
    opts: &Opts,
) -> Result<Prepared> {
    let prepared = prepare(runner, prompt, opts).await?;

    let client = Client::try_default().await?;
    apply_all(&client, &prepared.cluster.project, &prepared.image).await?;

    let cluster = KubeCluster::new(client);
    wait_all_available(&cluster, Duration::from_secs(opts.timeout_secs)).await?;

    prompt.say(&prepared.to_string())?;
    smoke_check(&cluster, prompt, opts.yes).await?;
    Ok(prepared)
}

/// Offer to list the workload pods and their phase. Returns how many were listed, `None` when
/// declined.
pub async fn smoke_check(
    cluster: &impl Cluster,
    prompt: &mut impl Prompt,
    yes: bool,
) -> Result<Option<usize>> {
    if !yes && !ask_yes_no(prompt, "Run a smoke check of the load generator pods?")? {
        info!("smoke check skipped");
        return Ok(None);
    }
    let pods = cluster
        .pods(LOADGEN_NAMESPACE, &format!("app={LOADGEN_APP}"))
        .await?;
    if pods.is_empty() {
        prompt.say("No load generator pods found.")?;
    }
    for pod in &pods {
        let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        prompt.say(&format!("pod {name}: {phase}"))?;
    }
    Ok(Some(pods.len()))
}
