//! Fixed names of the resources the driver owns.

/// Namespace holding the load generator and its configuration.
pub const LOADGEN_NAMESPACE: &str = "loadgen";
/// Namespace holding Grafana.
pub const MONITORING_NAMESPACE: &str = "monitoring";

/// ConfigMap holding the load configuration record.
pub const CONFIG_MAP_NAME: &str = "loadgen-config";

/// App, deployment, service and container name of the load generator.
pub const LOADGEN_APP: &str = "loadgen";
/// App, deployment and service name of Grafana.
pub const GRAFANA_APP: &str = "grafana";
/// App, deployment and service name of the managed Prometheus query frontend.
pub const FRONTEND_APP: &str = "frontend";
/// PodMonitoring selecting the load generator pods for managed collection.
pub const POD_MONITORING_NAME: &str = "loadgen";
/// Claim backing the Grafana data directory.
pub const GRAFANA_CLAIM_NAME: &str = "grafana-storage";
/// ConfigMap provisioning the Grafana data sources.
pub const DATASOURCES_CONFIG_MAP_NAME: &str = "grafana-datasources";
/// ConfigMap provisioning the Grafana dashboard provider.
pub const DASHBOARDS_CONFIG_MAP_NAME: &str = "grafana-dashboards";

/// Port of the load generator metrics endpoint.
pub const METRICS_PORT: i32 = 8000;
/// Port of the managed Prometheus query frontend.
pub const FRONTEND_PORT: i32 = 9090;
/// Port of the Grafana web UI.
pub const GRAFANA_PORT: i32 = 3000;
/// Default Grafana admin user.
pub const GRAFANA_ADMIN_USER: &str = "admin";
/// Default Grafana admin password.
pub const GRAFANA_ADMIN_PASSWORD: &str = "admin";
