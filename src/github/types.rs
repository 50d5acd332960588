use serde::{Deserialize, Serialize};

use crate::release::ReleaseAsset;

/// The fields of a GitHub release asset the uploader relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPayload {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub browser_download_url: Option<String>,
}

impl AssetPayload {
    pub fn into_asset(self, tag_name: &str) -> ReleaseAsset {
        ReleaseAsset {
            tag_name: tag_name.to_string(),
            name: self.name,
            id: Some(self.id),
            url: self.browser_download_url,
        }
    }
}
