use std::collections::BTreeMap;

use crate::MANAGER_NAME;

/// Create labels that can be used as a unique selector for a given app name.
pub fn selector_labels(app: &str) -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "app".to_owned(),
        app.to_owned(),
    )]))
}

/// Label selector matching every resource the driver manages.
pub const MANAGED_BY_LABEL_SELECTOR: &str = "app.kubernetes.io/managed-by=loadgenctl";

/// Labels that indicate the resource is managed by the driver.
pub fn managed_labels() -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "app.kubernetes.io/managed-by".to_owned(),
        MANAGER_NAME.to_owned(),
    )]))
}

/// Managed labels extended with the selector labels of an app.
pub fn app_labels(app: &str) -> Option<BTreeMap<String, String>> {
    let mut labels = managed_labels().unwrap_or_default();
    labels.extend(selector_labels(app).unwrap_or_default());
    Some(labels)
}
