use serde::{Deserialize, Serialize};

use crate::release::Release;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPayload {
    pub id: String,
}

/// A GitLab release as returned by `/projects/:id/releases/:tag_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePayload {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub commit: Option<CommitPayload>,
}

impl ReleasePayload {
    pub fn into_release(self) -> Release {
        let mut release = Release::new(self.tag_name);
        release.name = self.name.unwrap_or_default();
        release.body = self.description.unwrap_or_default();
        release.target_commitish = self.commit.map(|c| c.id).unwrap_or_default();
        release
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPayload {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Answer of `/projects/:id/uploads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub alt: String,
    pub url: String,
    #[serde(default)]
    pub markdown: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateReleaseRequest<'a> {
    pub tag_name: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct UpdateReleaseRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateTagRequest<'a> {
    pub tag_name: &'a str,
    #[serde(rename = "ref")]
    pub git_ref: &'a str,
    pub message: &'a str,
}
