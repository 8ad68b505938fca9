//! Teardown of everything the driver deployed.
use std::fmt;

use clap::Args;
use tracing::{info, warn};

use crate::{
    cluster::Cluster,
    error::Result,
    exec::CommandRunner,
    image,
    locator::active_project,
    names::{LOADGEN_NAMESPACE, MONITORING_NAMESPACE},
    prereq::{check_tools, IMAGE_TOOLS},
    prompt::{confirm, Confirmation, Prompt},
};

/// Options for the cleanup command.
#[derive(Args, Clone, Debug, Default)]
pub struct Opts {
    /// Confirm the resource deletion and the image removal without asking.
    #[arg(long, env = "LOADGEN_YES")]
    pub yes: bool,
}

/// Which namespaces existed when cleanup started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Presence {
    /// The load generator namespace.
    pub loadgen: bool,
    /// The monitoring namespace.
    pub monitoring: bool,
}

impl Presence {
    async fn probe(cluster: &impl Cluster) -> Result<Self> {
        Ok(Self {
            loadgen: cluster.namespace_exists(LOADGEN_NAMESPACE).await?,
            monitoring: cluster.namespace_exists(MONITORING_NAMESPACE).await?,
        })
    }

    fn any(&self) -> bool {
        self.loadgen || self.monitoring
    }
}

/// What cleanup removed. Namespaces are reported from [`Presence`], not from deletion results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    /// Namespaces deleted.
    pub removed: Presence,
    /// Whether image removal was accepted.
    pub images: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleanup summary:")?;
        if self.removed.loadgen {
            writeln!(f, "  removed namespace {LOADGEN_NAMESPACE} and the load generator")?;
        }
        if self.removed.monitoring {
            writeln!(
                f,
                "  removed namespace {MONITORING_NAMESPACE}, Grafana and its storage"
            )?;
        }
        if self.images {
            writeln!(f, "  removed load generator images")?;
        }
        Ok(())
    }
}

/// Result of a cleanup run. Every variant exits successfully.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The operator did not confirm.
    Cancelled,
    /// Neither namespace existed.
    NothingToDo,
    /// Deletions ran.
    Completed(Summary),
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupOutcome::Cancelled => write!(f, "Cleanup cancelled."),
            CleanupOutcome::NothingToDo => write!(f, "Nothing to clean up."),
            CleanupOutcome::Completed(summary) => write!(f, "{summary}"),
        }
    }
}

/// Delete the driver's namespaces and, when accepted, its images.
#[tracing::instrument(skip_all)]
pub async fn run(
    cluster: &impl Cluster,
    runner: &impl CommandRunner,
    prompt: &mut impl Prompt,
    opts: &Opts,
) -> Result<CleanupOutcome> {
    if !accepted(
        prompt,
        opts,
        &format!(
            "This deletes the {LOADGEN_NAMESPACE} and {MONITORING_NAMESPACE} namespaces and \
             everything in them."
        ),
    )? {
        info!("cleanup cancelled");
        return Ok(CleanupOutcome::Cancelled);
    }

    let presence = Presence::probe(cluster).await?;
    if !presence.any() {
        info!("nothing to clean up");
        return Ok(CleanupOutcome::NothingToDo);
    }

    if presence.loadgen {
        info!(ns = LOADGEN_NAMESPACE, "deleting load generator");
        cluster.delete_workloads(LOADGEN_NAMESPACE).await?;
        let deletion = cluster.delete_namespace(LOADGEN_NAMESPACE).await?;
        info!(ns = LOADGEN_NAMESPACE, ?deletion, "namespace deleted");
    }
    if presence.monitoring {
        info!(ns = MONITORING_NAMESPACE, "deleting monitoring stack");
        cluster.delete_workloads(MONITORING_NAMESPACE).await?;
        cluster.delete_claims(MONITORING_NAMESPACE).await?;
        let deletion = cluster.delete_namespace(MONITORING_NAMESPACE).await?;
        info!(ns = MONITORING_NAMESPACE, ?deletion, "namespace deleted");
    }

    let images = accepted(prompt, opts, "Also remove the load generator images?")?;
    if images {
        check_tools(runner, &IMAGE_TOOLS).await?;
        let project = match active_project(runner).await {
            Ok(project) => Some(project),
            Err(err) => {
                warn!(%err, "no active project, only local images are removed");
                None
            }
        };
        image::remove(runner, project.as_deref()).await;
    }

    Ok(CleanupOutcome::Completed(Summary {
        removed: presence,
        images,
    }))
}

fn accepted(prompt: &mut impl Prompt, opts: &Opts, message: &str) -> Result<bool> {
    if opts.yes {
        return Ok(true);
    }
    Ok(confirm(prompt, message)? == Confirmation::Accepted)
}
