//! Typed manifests of every resource the driver applies.
use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy},
        core::v1::{
            ConfigMap, ConfigMapKeySelector, ConfigMapVolumeSource, Container, ContainerPort,
            EnvVar, EnvVarSource, HTTPGetAction, Namespace, PersistentVolumeClaim,
            PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSecurityContext,
            PodSpec, PodTemplateSpec, Probe, ResourceRequirements, Service, ServicePort,
            ServiceSpec, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity,
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use loadgen_common::config::LoadConfig;
use serde_json::json;

use crate::{
    labels::{app_labels, managed_labels, selector_labels},
    names::{
        CONFIG_MAP_NAME, DASHBOARDS_CONFIG_MAP_NAME, DATASOURCES_CONFIG_MAP_NAME, FRONTEND_APP,
        FRONTEND_PORT, GRAFANA_ADMIN_PASSWORD, GRAFANA_ADMIN_USER, GRAFANA_APP, GRAFANA_CLAIM_NAME,
        GRAFANA_PORT, LOADGEN_APP, LOADGEN_NAMESPACE, METRICS_PORT, MONITORING_NAMESPACE,
        POD_MONITORING_NAME,
    },
};

const GRAFANA_IMAGE: &str = "grafana/grafana:10.4.2";
const FRONTEND_IMAGE: &str = "gke.gcr.io/prometheus-engine/frontend:v0.8.0-gke.4";
/// Scrape interval of the load generator metrics endpoint.
const SCRAPE_INTERVAL: &str = "15s";

/// Environment variable of the workload fed from each configuration key.
const CONFIG_ENV: [(&str, &str); 8] = [
    ("WORKLOAD_TYPE", "workload-type"),
    ("LOAD_INTENSITY", "load-intensity"),
    ("CPU_THREADS", "cpu-threads"),
    ("MEMORY_CHUNK_SIZE_MB", "memory-chunk-size-mb"),
    ("NETWORK_CONCURRENT_REQUESTS", "network-concurrent-requests"),
    ("STORAGE_FILE_SIZE_MB", "storage-file-size-mb"),
    ("DURATION", "duration"),
    ("BURST_PATTERN", "burst-pattern"),
];

fn metadata(ns: Option<&str>, name: &str, labels: Option<BTreeMap<String, String>>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        namespace: ns.map(str::to_owned),
        labels,
        ..ObjectMeta::default()
    }
}

fn quantities(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, Quantity>> {
    Some(BTreeMap::from_iter(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Quantity(v.to_string()))),
    ))
}

/// Namespaces in apply order.
pub fn namespaces() -> Vec<Namespace> {
    [LOADGEN_NAMESPACE, MONITORING_NAMESPACE]
        .into_iter()
        .map(|name| Namespace {
            metadata: metadata(None, name, managed_labels()),
            ..Default::default()
        })
        .collect()
}

/// The configuration object holding the load configuration record.
pub fn load_config_map(config: &LoadConfig) -> ConfigMap {
    ConfigMap {
        metadata: metadata(Some(LOADGEN_NAMESPACE), CONFIG_MAP_NAME, managed_labels()),
        data: Some(config.to_data()),
        ..Default::default()
    }
}

fn config_env() -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = CONFIG_ENV
        .iter()
        .map(|(name, key)| EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                config_map_key_ref: Some(ConfigMapKeySelector {
                    name: Some(CONFIG_MAP_NAME.to_owned()),
                    key: key.to_string(),
                    // Absent keys fall back to the workload defaults
                    optional: Some(true),
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();
    env.push(EnvVar {
        name: "METRICS_PORT".to_owned(),
        value: Some(METRICS_PORT.to_string()),
        ..Default::default()
    });
    env
}

/// The load generator deployment running `image`. Fresh deployments start from the local tag and
/// the applier patches the image to the pushed registry path.
pub fn loadgen_deployment(image: &str) -> Deployment {
    Deployment {
        metadata: metadata(Some(LOADGEN_NAMESPACE), LOADGEN_APP, app_labels(LOADGEN_APP)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: selector_labels(LOADGEN_APP),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: selector_labels(LOADGEN_APP),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: LOADGEN_APP.to_owned(),
                        image: Some(image.to_owned()),
                        image_pull_policy: Some("Always".to_owned()),
                        env: Some(config_env()),
                        ports: Some(vec![ContainerPort {
                            container_port: METRICS_PORT,
                            name: Some("metrics".to_owned()),
                            ..Default::default()
                        }]),
                        resources: Some(ResourceRequirements {
                            limits: quantities(&[("cpu", "2"), ("memory", "2Gi")]),
                            requests: quantities(&[("cpu", "500m"), ("memory", "512Mi")]),
                            ..Default::default()
                        }),
                        readiness_probe: Some(Probe {
                            http_get: Some(HTTPGetAction {
                                path: Some("/metrics".to_owned()),
                                port: IntOrString::Int(METRICS_PORT),
                                ..Default::default()
                            }),
                            initial_delay_seconds: Some(5),
                            period_seconds: Some(10),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service exposing the load generator metrics endpoint.
pub fn loadgen_service() -> Service {
    Service {
        metadata: metadata(Some(LOADGEN_NAMESPACE), LOADGEN_APP, app_labels(LOADGEN_APP)),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("metrics".to_owned()),
                port: METRICS_PORT,
                protocol: Some("TCP".to_owned()),
                target_port: Some(IntOrString::Int(METRICS_PORT)),
                ..Default::default()
            }]),
            selector: selector_labels(LOADGEN_APP),
            type_: Some("ClusterIP".to_owned()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Type of the managed Prometheus `PodMonitoring` custom resource.
pub fn pod_monitoring_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("monitoring.googleapis.com", "v1", "PodMonitoring"),
        "podmonitorings",
    )
}

/// Managed collection of the load generator metrics port. Managed Prometheus ignores scrape
/// annotations and only collects what a `PodMonitoring` selects.
pub fn pod_monitoring() -> DynamicObject {
    let mut object = DynamicObject::new(POD_MONITORING_NAME, &pod_monitoring_resource())
        .within(LOADGEN_NAMESPACE)
        .data(json!({
            "spec": {
                "endpoints": [{
                    "interval": SCRAPE_INTERVAL,
                    "path": "/metrics",
                    "port": "metrics",
                }],
                "selector": { "matchLabels": selector_labels(LOADGEN_APP) },
            }
        }));
    object.metadata.labels = app_labels(LOADGEN_APP);
    object
}

/// Query endpoint of the managed Prometheus frontend inside the monitoring namespace.
pub fn frontend_url() -> String {
    format!("http://{FRONTEND_APP}.{MONITORING_NAMESPACE}.svc:{FRONTEND_PORT}")
}

/// The managed Prometheus query frontend, serving the PromQL API of `project` to Grafana.
pub fn frontend_deployment(project: &str) -> Deployment {
    let probe = |path: &str| Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_owned()),
            port: IntOrString::String("web".to_owned()),
            ..Default::default()
        }),
        ..Default::default()
    };
    Deployment {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            FRONTEND_APP,
            app_labels(FRONTEND_APP),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: selector_labels(FRONTEND_APP),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: selector_labels(FRONTEND_APP),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: FRONTEND_APP.to_owned(),
                        image: Some(FRONTEND_IMAGE.to_owned()),
                        args: Some(vec![
                            format!("--web.listen-address=:{FRONTEND_PORT}"),
                            format!("--query.project-id={project}"),
                        ]),
                        ports: Some(vec![ContainerPort {
                            container_port: FRONTEND_PORT,
                            name: Some("web".to_owned()),
                            ..Default::default()
                        }]),
                        resources: Some(ResourceRequirements {
                            limits: quantities(&[("cpu", "250m"), ("memory", "256Mi")]),
                            requests: quantities(&[("cpu", "50m"), ("memory", "64Mi")]),
                            ..Default::default()
                        }),
                        readiness_probe: Some(probe("/-/ready")),
                        liveness_probe: Some(probe("/-/healthy")),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service Grafana queries the frontend through.
pub fn frontend_service() -> Service {
    Service {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            FRONTEND_APP,
            app_labels(FRONTEND_APP),
        ),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("web".to_owned()),
                port: FRONTEND_PORT,
                protocol: Some("TCP".to_owned()),
                target_port: Some(IntOrString::String("web".to_owned())),
                ..Default::default()
            }]),
            selector: selector_labels(FRONTEND_APP),
            type_: Some("ClusterIP".to_owned()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Claim backing the Grafana data directory.
pub fn grafana_claim() -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            GRAFANA_CLAIM_NAME,
            app_labels(GRAFANA_APP),
        ),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
            resources: Some(ResourceRequirements {
                requests: quantities(&[("storage", "1Gi")]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn grafana_volume(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        mount_path: mount_path.to_owned(),
        name: name.to_owned(),
        ..Default::default()
    }
}

/// The Grafana deployment.
pub fn grafana_deployment() -> Deployment {
    let env = vec![
        EnvVar {
            name: "GF_SECURITY_ADMIN_USER".to_owned(),
            value: Some(GRAFANA_ADMIN_USER.to_owned()),
            ..Default::default()
        },
        EnvVar {
            name: "GF_SECURITY_ADMIN_PASSWORD".to_owned(),
            value: Some(GRAFANA_ADMIN_PASSWORD.to_owned()),
            ..Default::default()
        },
    ];

    Deployment {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            GRAFANA_APP,
            app_labels(GRAFANA_APP),
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: selector_labels(GRAFANA_APP),
                ..Default::default()
            },
            // The data claim is ReadWriteOnce, the old pod has to release it first
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_owned()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: selector_labels(GRAFANA_APP),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    security_context: Some(PodSecurityContext {
                        fs_group: Some(472),
                        ..Default::default()
                    }),
                    containers: vec![Container {
                        name: GRAFANA_APP.to_owned(),
                        image: Some(GRAFANA_IMAGE.to_owned()),
                        env: Some(env),
                        ports: Some(vec![ContainerPort {
                            container_port: GRAFANA_PORT,
                            name: Some("webui".to_owned()),
                            ..Default::default()
                        }]),
                        resources: Some(ResourceRequirements {
                            limits: quantities(&[("cpu", "500m"), ("memory", "512Mi")]),
                            requests: quantities(&[("cpu", "250m"), ("memory", "256Mi")]),
                            ..Default::default()
                        }),
                        readiness_probe: Some(Probe {
                            http_get: Some(HTTPGetAction {
                                path: Some("/api/health".to_owned()),
                                port: IntOrString::Int(GRAFANA_PORT),
                                ..Default::default()
                            }),
                            initial_delay_seconds: Some(10),
                            period_seconds: Some(10),
                            ..Default::default()
                        }),
                        volume_mounts: Some(vec![
                            grafana_volume("storage", "/var/lib/grafana"),
                            grafana_volume("datasources", "/etc/grafana/provisioning/datasources"),
                            grafana_volume("dashboards", "/etc/grafana/provisioning/dashboards"),
                        ]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![
                        Volume {
                            name: "storage".to_owned(),
                            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                claim_name: GRAFANA_CLAIM_NAME.to_owned(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "datasources".to_owned(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: Some(DATASOURCES_CONFIG_MAP_NAME.to_owned()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "dashboards".to_owned(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: Some(DASHBOARDS_CONFIG_MAP_NAME.to_owned()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service exposing the Grafana web UI.
pub fn grafana_service() -> Service {
    Service {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            GRAFANA_APP,
            app_labels(GRAFANA_APP),
        ),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("webui".to_owned()),
                port: GRAFANA_PORT,
                protocol: Some("TCP".to_owned()),
                target_port: Some(IntOrString::Int(GRAFANA_PORT)),
                ..Default::default()
            }]),
            selector: selector_labels(GRAFANA_APP),
            type_: Some("ClusterIP".to_owned()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Grafana data source provisioning.
pub fn datasources_config_map() -> ConfigMap {
    let datasources = format!(
        "apiVersion: 1
datasources:
  - name: Managed Prometheus
    type: prometheus
    access: proxy
    url: {}
    isDefault: true
    editable: true
",
        frontend_url()
    );
    ConfigMap {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            DATASOURCES_CONFIG_MAP_NAME,
            app_labels(GRAFANA_APP),
        ),
        data: Some(BTreeMap::from_iter([(
            "datasources.yaml".to_owned(),
            datasources,
        )])),
        ..Default::default()
    }
}

/// Grafana dashboard provider provisioning. Dashboards themselves are managed in Grafana.
pub fn dashboards_config_map() -> ConfigMap {
    let provider = "apiVersion: 1
providers:
  - name: loadgen
    orgId: 1
    folder: Load Generator
    type: file
    disableDeletion: false
    allowUiUpdates: true
    options:
      path: /var/lib/grafana/dashboards
";
    ConfigMap {
        metadata: metadata(
            Some(MONITORING_NAMESPACE),
            DASHBOARDS_CONFIG_MAP_NAME,
            app_labels(GRAFANA_APP),
        ),
        data: Some(BTreeMap::from_iter([(
            "dashboards.yaml".to_owned(),
            provider.to_owned(),
        )])),
        ..Default::default()
    }
}
