//! Applies every manifest in a fixed order and points the workload at the pushed image.
use k8s_openapi::api::{apps::v1::Deployment, core::v1::ConfigMap};
use kube::{
    api::{Patch, PatchParams},
    client::Client,
    Api, ResourceExt,
};
use loadgen_common::config::LoadConfig;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    error::{is_not_found, Result},
    image::LOCAL_TAG,
    manifests,
    names::{CONFIG_MAP_NAME, LOADGEN_APP, LOADGEN_NAMESPACE, POD_MONITORING_NAME},
    utils::{apply_cluster, apply_dynamic, apply_namespaced},
    MANAGER_NAME,
};

/// Apply namespaces, configuration, workload and monitoring resources, then patch the workload
/// image to `image`. The query frontend reads the metrics of `project`.
///
/// Every step is a server-side apply, so reruns with unchanged manifests change nothing. There
/// is no rollback: a failure leaves the steps before it applied.
#[tracing::instrument(skip(client))]
pub async fn apply_all(client: &Client, project: &str, image: &str) -> Result<()> {
    for namespace in manifests::namespaces() {
        info!(namespace = namespace.name_any(), "applying namespace");
        apply_cluster(client, &namespace).await?;
    }

    // The record is only seeded, operator changes survive redeploys
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), LOADGEN_NAMESPACE);
    if config_maps.get_opt(CONFIG_MAP_NAME).await?.is_some() {
        info!(name = CONFIG_MAP_NAME, "keeping existing load configuration");
    } else {
        info!(name = CONFIG_MAP_NAME, "applying default load configuration");
        apply_namespaced(client, &manifests::load_config_map(&LoadConfig::defaults())).await?;
    }

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), LOADGEN_NAMESPACE);
    // Keep the running image so reapplying the manifest does not roll the pods twice
    let running = deployments
        .get_opt(LOADGEN_APP)
        .await?
        .as_ref()
        .and_then(container_image);
    debug!(?running, "current workload image");
    info!(name = LOADGEN_APP, "applying workload");
    apply_namespaced(
        client,
        &manifests::loadgen_deployment(running.as_deref().unwrap_or(LOCAL_TAG)),
    )
    .await?;
    apply_namespaced(client, &manifests::loadgen_service()).await?;
    set_image(&deployments, image).await?;
    apply_pod_monitoring(client).await?;

    info!("applying monitoring stack");
    apply_namespaced(client, &manifests::frontend_deployment(project)).await?;
    apply_namespaced(client, &manifests::frontend_service()).await?;
    apply_namespaced(client, &manifests::grafana_claim()).await?;
    apply_namespaced(client, &manifests::grafana_deployment()).await?;
    apply_namespaced(client, &manifests::grafana_service()).await?;
    apply_namespaced(client, &manifests::datasources_config_map()).await?;
    apply_namespaced(client, &manifests::dashboards_config_map()).await?;

    Ok(())
}

/// Apply the collection rule of the workload metrics. Clusters without managed Prometheus lack
/// the resource type, which only costs the metrics.
async fn apply_pod_monitoring(client: &Client) -> Result<()> {
    info!(name = POD_MONITORING_NAME, "applying pod monitoring");
    match apply_dynamic(
        client,
        &manifests::pod_monitoring(),
        &manifests::pod_monitoring_resource(),
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(err) if is_not_found(&err) => {
            warn!(
                name = POD_MONITORING_NAME,
                "PodMonitoring is not served by this cluster, workload metrics are not collected"
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Point the workload container at `image`.
pub async fn set_image(deployments: &Api<Deployment>, image: &str) -> Result<()> {
    info!(%image, "patching workload image");
    let patch = json!({
        "spec": {
            "template": {
                "spec": {
                    "containers": [{ "name": LOADGEN_APP, "image": image }]
                }
            }
        }
    });
    let params = PatchParams {
        field_manager: Some(MANAGER_NAME.to_owned()),
        ..Default::default()
    };
    deployments
        .patch(LOADGEN_APP, &params, &Patch::Strategic(patch))
        .await?;
    Ok(())
}

/// Image of the workload container, if any.
pub fn container_image(deployment: &Deployment) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == LOADGEN_APP)?
        .image
        .clone()
}

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use tracing_test::traced_test;

    use super::*;
    use crate::utils::test::{
        json_response, mock_client, not_found, serve, timeout_after_1s, Request,
    };

    const IMAGE: &str = "gcr.io/demo-project/loadgen:latest";

    /// Answer like an API server that already holds the driver resources when `deployed`.
    fn respond(deployed: bool) -> impl Fn(&Request) -> http::Response<hyper::Body> + Send + 'static {
        move |request| match request.method.as_str() {
            "GET" if !deployed => not_found(),
            "GET" if request.path.ends_with("/configmaps/loadgen-config") => {
                json_response(&manifests::load_config_map(&LoadConfig::defaults()))
            }
            "GET" => json_response(&manifests::loadgen_deployment(IMAGE)),
            // Strategic patches carry no kind, answer with the full object
            _ if request.body.get("kind").is_none() => {
                json_response(&manifests::loadgen_deployment(IMAGE))
            }
            _ => json_response(&request.body),
        }
    }

    const PROJECT: &str = "demo-project";
    const POD_MONITORING: &str =
        "PATCH /apis/monitoring.googleapis.com/v1/namespaces/loadgen/podmonitorings/loadgen";

    const APPLY_ORDER: [&str; 16] = [
        "PATCH /api/v1/namespaces/loadgen",
        "PATCH /api/v1/namespaces/monitoring",
        "GET /api/v1/namespaces/loadgen/configmaps/loadgen-config",
        "PATCH /api/v1/namespaces/loadgen/configmaps/loadgen-config",
        "GET /apis/apps/v1/namespaces/loadgen/deployments/loadgen",
        "PATCH /apis/apps/v1/namespaces/loadgen/deployments/loadgen",
        "PATCH /api/v1/namespaces/loadgen/services/loadgen",
        "PATCH /apis/apps/v1/namespaces/loadgen/deployments/loadgen",
        POD_MONITORING,
        "PATCH /apis/apps/v1/namespaces/monitoring/deployments/frontend",
        "PATCH /api/v1/namespaces/monitoring/services/frontend",
        "PATCH /api/v1/namespaces/monitoring/persistentvolumeclaims/grafana-storage",
        "PATCH /apis/apps/v1/namespaces/monitoring/deployments/grafana",
        "PATCH /api/v1/namespaces/monitoring/services/grafana",
        "PATCH /api/v1/namespaces/monitoring/configmaps/grafana-datasources",
        "PATCH /api/v1/namespaces/monitoring/configmaps/grafana-dashboards",
    ];

    #[tokio::test]
    async fn fresh_cluster_applies_in_order() {
        let (client, handle) = mock_client();
        let server = serve(handle, APPLY_ORDER.len(), respond(false));

        apply_all(&client, PROJECT, IMAGE).await.unwrap();

        let requests = timeout_after_1s(server).await;
        let lines: Vec<String> = requests.iter().map(|r| r.line()).collect();
        assert_eq!(lines, APPLY_ORDER);

        // Fresh workloads start from the local tag before the image patch
        assert_eq!(
            requests[5].body["spec"]["template"]["spec"]["containers"][0]["image"],
            LOCAL_TAG
        );
        assert_eq!(
            requests[7].content_type,
            "application/strategic-merge-patch+json"
        );
        expect![[r#"
            {
              "spec": {
                "template": {
                  "spec": {
                    "containers": [
                      {
                        "image": "gcr.io/demo-project/loadgen:latest",
                        "name": "loadgen"
                      }
                    ]
                  }
                }
              }
            }"#]]
        .assert_eq(&requests[7].pretty_body());
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_pod_monitoring_type_is_tolerated() {
        let (client, handle) = mock_client();
        let fresh = respond(false);
        let server = serve(handle, APPLY_ORDER.len(), move |request| {
            if request.line() == POD_MONITORING {
                not_found()
            } else {
                fresh(request)
            }
        });

        apply_all(&client, PROJECT, IMAGE).await.unwrap();

        let requests = timeout_after_1s(server).await;
        let lines: Vec<String> = requests.iter().map(|r| r.line()).collect();
        // The monitoring stack is still applied after the rejected PodMonitoring
        assert_eq!(lines, APPLY_ORDER);
        assert!(logs_contain("workload metrics are not collected"));
    }

    #[tokio::test]
    async fn rerun_keeps_config_and_running_image() {
        let (client, handle) = mock_client();
        let server = serve(handle, APPLY_ORDER.len() - 1, respond(true));

        apply_all(&client, PROJECT, IMAGE).await.unwrap();

        let requests = timeout_after_1s(server).await;
        let lines: Vec<String> = requests.iter().map(|r| r.line()).collect();
        // Only the config map apply is skipped, everything else is reapplied unchanged
        let expected: Vec<&str> = APPLY_ORDER
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 3)
            .map(|(_, line)| *line)
            .collect();
        assert_eq!(lines, expected);
        assert_eq!(
            requests[4].body["spec"]["template"]["spec"]["containers"][0]["image"],
            IMAGE
        );
    }
}
