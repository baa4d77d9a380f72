use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Raw object names as the operator supplies them. Never validated against
/// the control plane here; a wrong name surfaces when an operation on the
/// derived path fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInventoryNames {
    pub datacenter: String,
    pub cluster: String,
    pub folder: String,
    pub datastore: String,
    pub network: String,
}

/// Canonical hierarchical paths, derived by pure string composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPath {
    pub datacenter_path: String,
    pub cluster_path: String,
    pub resource_pool_path: String,
    pub folder_path: String,
    pub datastore_path: String,
    pub network_path: String,
}

impl InventoryPath {
    pub fn derive(names: &RawInventoryNames) -> Self {
        let datacenter_path = format!("/{}", names.datacenter);
        let cluster_path = format!("{datacenter_path}/host/{}", names.cluster);
        Self {
            resource_pool_path: format!("{cluster_path}/Resources"),
            folder_path: format!("{datacenter_path}/vm/{}", names.folder),
            datastore_path: format!("{datacenter_path}/datastore/{}", names.datastore),
            network_path: format!("{datacenter_path}/network/{}", names.network),
            datacenter_path,
            cluster_path,
        }
    }
}

/// Strict parser for input supplied as a full VM-folder path instead of a
/// bare folder name. Accepts only `/<datacenter>/vm/<segment...>` and returns
/// `(datacenter, folder leaf)`; anything else is rejected loudly rather than
/// silently composing a malformed path.
pub fn parse_folder_path(input: &str) -> Result<(String, String), ValidationError> {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Err(ValidationError::InvalidPath(trimmed.to_owned()));
    };

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.len() < 3 || segments[1] != "vm" || segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::InvalidPath(trimmed.to_owned()));
    }

    Ok((
        segments[0].to_owned(),
        segments.last().unwrap().to_string(),
    ))
}
