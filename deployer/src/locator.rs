//! Resolution of the target cluster: project, name and zone or region.
use std::fmt;

use clap::Args;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    exec::{args, CommandRunner},
    prompt::Prompt,
};

/// Options selecting the target cluster.
#[derive(Args, Clone, Debug, Default)]
pub struct Overrides {
    /// Name of the GKE cluster, prompted for when absent.
    #[arg(long, env = "LOADGEN_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// Zone of a zonal cluster, detected when neither zone nor region is given.
    #[arg(long, env = "LOADGEN_ZONE", conflicts_with = "region")]
    pub zone: Option<String>,

    /// Region of a regional cluster, detected when neither zone nor region is given.
    #[arg(long, env = "LOADGEN_REGION")]
    pub region: Option<String>,
}

/// Where a cluster lives. Exactly one of zone or region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// A zonal cluster, e.g. `us-central1-a`.
    Zone(String),
    /// A regional cluster, e.g. `us-central1`.
    Region(String),
}

impl Location {
    /// Classify a location: values ending in a hyphen and a single letter are zones.
    pub fn classify(value: &str) -> Self {
        let value = value.trim();
        let mut tail = value.chars().rev();
        match (tail.next(), tail.next()) {
            (Some(letter), Some('-')) if letter.is_ascii_lowercase() => {
                Location::Zone(value.to_owned())
            }
            _ => Location::Region(value.to_owned()),
        }
    }

    /// Parse the location reported by `gcloud`. The first non-empty line is used and only its
    /// last path segment is kept.
    pub fn from_reported(raw: &str) -> Option<Self> {
        let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
        let value = line.rsplit('/').next().unwrap_or(line).trim();
        if value.is_empty() {
            None
        } else {
            Some(Self::classify(value))
        }
    }

    /// The location value.
    pub fn as_str(&self) -> &str {
        match self {
            Location::Zone(v) | Location::Region(v) => v,
        }
    }

    /// `gcloud` flags selecting this location.
    pub fn flags(&self) -> [String; 2] {
        match self {
            Location::Zone(zone) => ["--zone".to_owned(), zone.clone()],
            Location::Region(region) => ["--region".to_owned(), region.clone()],
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Zone(zone) => write!(f, "zone {zone}"),
            Location::Region(region) => write!(f, "region {region}"),
        }
    }
}

/// Identifies the target cluster. Resolved once and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterRef {
    /// Google Cloud project id.
    pub project: String,
    /// Cluster name.
    pub name: String,
    /// Cluster zone or region.
    pub location: Location,
}

impl ClusterRef {
    /// Arguments naming this cluster for `gcloud container clusters <verb>`.
    pub fn gcloud_args(&self, verb: &str) -> Vec<String> {
        let mut list = args(["container", "clusters", verb]);
        list.push(self.name.clone());
        list.extend(self.location.flags());
        list.push(format!("--project={}", self.project));
        list
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.project, self.name, self.location)
    }
}

/// Read the active project from the gcloud configuration.
pub async fn active_project(runner: &impl CommandRunner) -> Result<String> {
    let project = runner
        .output("gcloud", &args(["config", "get-value", "project"]))
        .await?;
    let project = project.lines().last().unwrap_or_default().trim();
    if project.is_empty() || project == "(unset)" {
        return Err(Error::ProjectUnset);
    }
    Ok(project.to_owned())
}

/// Resolve the target cluster from overrides, detection and operator answers.
#[tracing::instrument(skip_all)]
pub async fn locate(
    runner: &impl CommandRunner,
    prompt: &mut impl Prompt,
    overrides: &Overrides,
) -> Result<ClusterRef> {
    let project = active_project(runner).await?;
    info!(%project, "using active project");

    match runner
        .output(
            "gcloud",
            &[
                args([
                    "container",
                    "clusters",
                    "list",
                    "--format=table(name,location,status)",
                ]),
                vec![format!("--project={project}")],
            ]
            .concat(),
        )
        .await
    {
        Ok(listing) => prompt.say(&format!("Available clusters:\n{listing}"))?,
        Err(err) => warn!(%err, "could not list clusters"),
    }

    let name = match overrides.cluster_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => prompt
            .ask("Enter the GKE cluster name: ")?
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .ok_or(Error::MissingClusterName)?,
    };

    let location = match (given(&overrides.zone), given(&overrides.region)) {
        (Some(zone), _) => Location::Zone(zone.to_owned()),
        (None, Some(region)) => Location::Region(region.to_owned()),
        (None, None) => match detect_location(runner, &project, &name).await {
            Some(location) => {
                info!(cluster = %name, %location, "detected cluster location");
                location
            }
            None => {
                let answer = prompt
                    .ask(&format!(
                        "Could not detect the location of '{name}'. Enter its zone or region: "
                    ))?
                    .map(|answer| answer.trim().to_owned())
                    .filter(|answer| !answer.is_empty())
                    .ok_or_else(|| Error::MissingLocation {
                        cluster: name.clone(),
                    })?;
                Location::classify(&answer)
            }
        },
    };

    Ok(ClusterRef {
        project,
        name,
        location,
    })
}

/// A non-blank override value.
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn detect_location(
    runner: &impl CommandRunner,
    project: &str,
    name: &str,
) -> Option<Location> {
    let reported = runner
        .output(
            "gcloud",
            &[
                args(["container", "clusters", "list"]),
                vec![
                    format!("--filter=name={name}"),
                    "--format=value(location)".to_owned(),
                    format!("--project={project}"),
                ],
            ]
            .concat(),
        )
        .await;
    match reported {
        Ok(raw) => Location::from_reported(&raw),
        Err(err) => {
            debug!(%err, "cluster location lookup failed");
            None
        }
    }
}

/// Write kubeconfig credentials for the cluster so the Kubernetes client targets it.
pub async fn fetch_credentials(runner: &impl CommandRunner, cluster: &ClusterRef) -> Result<()> {
    info!(%cluster, "fetching cluster credentials");
    runner
        .output("gcloud", &cluster.gcloud_args("get-credentials"))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exec::MockCommandRunner, prompt::test::Scripted};

    fn gcloud_project(runner: &mut MockCommandRunner, project: &'static str) {
        runner
            .expect_output()
            .withf(|program, args| program == "gcloud" && args == ["config", "get-value", "project"])
            .returning(move |_, _| Ok(project.to_owned()));
    }

    fn gcloud_listing(runner: &mut MockCommandRunner) {
        runner
            .expect_output()
            .withf(|_, args| args.iter().any(|a| a.starts_with("--format=table")))
            .returning(|_, _| Ok("NAME  LOCATION  STATUS".to_owned()));
    }

    fn gcloud_detect(runner: &mut MockCommandRunner, reported: &'static str) {
        runner
            .expect_output()
            .withf(|_, args| args.iter().any(|a| a == "--format=value(location)"))
            .returning(move |_, _| Ok(reported.to_owned()));
    }

    #[test]
    fn classify_zone_and_region() {
        assert_eq!(
            Location::classify("us-central1-a"),
            Location::Zone("us-central1-a".to_owned())
        );
        assert_eq!(
            Location::classify("europe-west4"),
            Location::Region("europe-west4".to_owned())
        );
        assert_eq!(
            Location::classify("us-east1-B"),
            Location::Region("us-east1-B".to_owned())
        );
    }

    #[test]
    fn reported_location_keeps_last_segment() {
        assert_eq!(
            Location::from_reported("projects/p/locations/us-central1-c\n"),
            Some(Location::Zone("us-central1-c".to_owned()))
        );
        assert_eq!(
            Location::from_reported("\nus-west1\nus-west2"),
            Some(Location::Region("us-west1".to_owned()))
        );
        assert_eq!(Location::from_reported("  \n"), None);
    }

    #[tokio::test]
    async fn unset_project_is_fatal() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "(unset)");
        let mut prompt = Scripted::new([]);
        let err = locate(&runner, &mut prompt, &Overrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProjectUnset), "{err:?}");
    }

    #[tokio::test]
    async fn detects_location_of_prompted_cluster() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "demo-project");
        gcloud_listing(&mut runner);
        gcloud_detect(&mut runner, "us-central1-a");
        let mut prompt = Scripted::new(["loadtest"]);

        let cluster = locate(&runner, &mut prompt, &Overrides::default())
            .await
            .unwrap();
        assert_eq!(
            cluster,
            ClusterRef {
                project: "demo-project".to_owned(),
                name: "loadtest".to_owned(),
                location: Location::Zone("us-central1-a".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn falls_back_to_operator_location() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "demo-project");
        gcloud_listing(&mut runner);
        gcloud_detect(&mut runner, "");
        let mut prompt = Scripted::new(["us-east4"]);
        let overrides = Overrides {
            cluster_name: Some("loadtest".to_owned()),
            ..Default::default()
        };

        let cluster = locate(&runner, &mut prompt, &overrides).await.unwrap();
        assert_eq!(cluster.location, Location::Region("us-east4".to_owned()));
        assert_eq!(prompt.asked.len(), 1);
    }

    #[tokio::test]
    async fn explicit_region_skips_detection() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "demo-project");
        gcloud_listing(&mut runner);
        let mut prompt = Scripted::new([]);
        let overrides = Overrides {
            cluster_name: Some("loadtest".to_owned()),
            zone: None,
            region: Some("us-central1".to_owned()),
        };

        let cluster = locate(&runner, &mut prompt, &overrides).await.unwrap();
        assert_eq!(
            cluster.location,
            Location::Region("us-central1".to_owned())
        );
        assert_eq!(
            cluster.gcloud_args("describe"),
            [
                "container",
                "clusters",
                "describe",
                "loadtest",
                "--region",
                "us-central1",
                "--project=demo-project",
            ]
        );
    }

    #[tokio::test]
    async fn blank_location_overrides_fall_back_to_detection() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "demo");
        gcloud_listing(&mut runner);
        gcloud_detect(&mut runner, "europe-west4");
        let mut prompt = Scripted::new([]);
        let overrides = Overrides {
            cluster_name: Some("c".to_owned()),
            zone: Some("  ".to_owned()),
            region: None,
        };

        let cluster = locate(&runner, &mut prompt, &overrides).await.unwrap();
        assert_eq!(
            cluster.location,
            Location::Region("europe-west4".to_owned())
        );

        // A blank zone next to a real region keeps the region
        let overrides = Overrides {
            cluster_name: Some("c".to_owned()),
            zone: Some(String::new()),
            region: Some(" us-central1 ".to_owned()),
        };
        let cluster = locate(&runner, &mut prompt, &overrides).await.unwrap();
        assert_eq!(
            cluster.location,
            Location::Region("us-central1".to_owned())
        );
        assert!(!cluster.location.as_str().is_empty());
    }

    #[tokio::test]
    async fn missing_cluster_name_is_fatal() {
        let mut runner = MockCommandRunner::new();
        gcloud_project(&mut runner, "demo-project");
        gcloud_listing(&mut runner);
        let mut prompt = Scripted::new([""]);
        let err = locate(&runner, &mut prompt, &Overrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingClusterName), "{err:?}");
    }
}
