//! Builds the load generator image and publishes it to the project registry.
use std::path::Path;

use tracing::{info, warn};

use crate::{
    error::Result,
    exec::{args, CommandRunner},
};

/// Tag of the locally built image.
pub const LOCAL_TAG: &str = "loadgen:latest";

/// Registry path of the published image for a project.
pub fn registry_path(project: &str) -> String {
    format!("gcr.io/{project}/loadgen:latest")
}

/// Build, tag and push the image. Returns the registry path that was pushed.
#[tracing::instrument(skip(runner))]
pub async fn build_and_push(
    runner: &impl CommandRunner,
    project: &str,
    context: &Path,
) -> Result<String> {
    let remote = registry_path(project);

    info!(tag = LOCAL_TAG, "building image");
    runner
        .stream(
            "docker",
            &[
                args(["build", "-t", LOCAL_TAG]),
                vec![context.display().to_string()],
            ]
            .concat(),
        )
        .await?;

    runner
        .output("docker", &[args(["tag", LOCAL_TAG]), vec![remote.clone()]].concat())
        .await?;

    runner
        .output("gcloud", &args(["auth", "configure-docker", "--quiet"]))
        .await?;

    info!(%remote, "pushing image");
    runner
        .stream("docker", &[args(["push"]), vec![remote.clone()]].concat())
        .await?;

    Ok(remote)
}

/// Remove the local tags and the pushed image. Images that are already gone are skipped.
/// Returns how many removals succeeded.
#[tracing::instrument(skip(runner))]
pub async fn remove(runner: &impl CommandRunner, project: Option<&str>) -> usize {
    let remote = project.map(registry_path);
    let mut removed = 0;

    let mut local = vec![LOCAL_TAG.to_owned()];
    local.extend(remote.clone());
    for tag in local {
        match runner
            .output("docker", &[args(["rmi", "--force"]), vec![tag.clone()]].concat())
            .await
        {
            Ok(_) => {
                info!(%tag, "removed local image");
                removed += 1;
            }
            Err(err) => warn!(%tag, %err, "local image not removed"),
        }
    }

    if let Some(remote) = remote {
        match runner
            .output(
                "gcloud",
                &[
                    args(["container", "images", "delete"]),
                    vec![remote.clone()],
                    args(["--force-delete-tags", "--quiet"]),
                ]
                .concat(),
            )
            .await
        {
            Ok(_) => {
                info!(%remote, "removed registry image");
                removed += 1;
            }
            Err(err) => warn!(%remote, %err, "registry image not removed"),
        }
    }

    removed
}
