use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::types::{
    CreateReleaseRequest, CreateTagRequest, ReleasePayload, TagPayload, UpdateReleaseRequest,
    UploadPayload,
};
use crate::config::ForgeKind;
use crate::error::{ForgeError, ForgeResult};
use crate::forge::{endpoint, ensure_success, ForgeClient};
use crate::release::{DownloadLink, Release, ReleaseAsset, ReleaseBody};

const USER_AGENT: &str = concat!("release-uploader/", env!("CARGO_PKG_VERSION"));

/// Text-encoded-storage backend.
///
/// GitLab releases are keyed by tag only and have no asset list of their
/// own: uploaded files are linked from a `Downloads:` section of the
/// description, so every asset change rewrites the description.
pub struct GitLabClient {
    http: reqwest::Client,
    token: String,
    project: String,
    api_url: String,
    /// Messages of tags deleted by this client, reused when the tag is
    /// recreated for a new commit.
    retired_tags: Mutex<HashMap<String, String>>,
}

impl GitLabClient {
    pub fn new(token: String, owner: String, repo: String, api_url: &str) -> ForgeResult<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            token,
            project: format!("{}/{}", owner, repo),
            api_url: api_url.to_string(),
            retired_tags: Mutex::new(HashMap::new()),
        })
    }

    fn project_endpoint(&self, rest: &[&str]) -> ForgeResult<reqwest::Url> {
        let mut segments = vec!["projects", self.project.as_str()];
        segments.extend_from_slice(rest);
        endpoint(&self.api_url, &segments)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.token)
    }

    fn retired_tags(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.retired_tags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch_release(&self, tag: &str) -> ForgeResult<Option<Release>> {
        let url = self.project_endpoint(&["releases", tag])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: ReleasePayload = ensure_success(response).await?.json().await?;
        Ok(Some(payload.into_release()))
    }

    async fn fetch_existing_release(&self, tag: &str) -> ForgeResult<Release> {
        self.fetch_release(tag)
            .await?
            .ok_or_else(|| ForgeError::NotFound(format!("GitLab release for tag {}", tag)))
    }

    async fn write_release(&self, tag: &str, name: &str, description: &str) -> ForgeResult<Release> {
        let url = self.project_endpoint(&["releases", tag])?;
        let request = UpdateReleaseRequest { name, description };
        let response = self.authorized(self.http.put(url)).json(&request).send().await?;
        let payload: ReleasePayload = ensure_success(response).await?.json().await?;
        Ok(payload.into_release())
    }

    /// Keep the downloads section last after edits to the free text.
    fn normalize_description(body: &str) -> String {
        let parsed = ReleaseBody::parse(body);
        if parsed.assets.is_empty() {
            body.to_string()
        } else {
            parsed.to_string()
        }
    }
}

#[async_trait]
impl ForgeClient for GitLabClient {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitLab
    }

    async fn get_release_by_tag(&self, tag: &str) -> ForgeResult<Option<Release>> {
        self.fetch_release(tag).await
    }

    async fn create_release(&self, release: &Release) -> ForgeResult<Release> {
        let tag = release.tag_name();
        let description = Self::normalize_description(&release.body);
        let target = Some(release.target_commitish.as_str()).filter(|t| !t.is_empty());
        let retired_message = self.retired_tags().remove(tag);

        let git_ref = match retired_message {
            Some(message) => {
                let git_ref = target.ok_or_else(|| {
                    ForgeError::InvalidResponse(format!("cannot recreate tag {} without a commit", tag))
                })?;
                debug!("Recreating tag {} at {}", tag, git_ref);
                let url = self.project_endpoint(&["repository", "tags"])?;
                let request = CreateTagRequest {
                    tag_name: tag,
                    git_ref,
                    message: &message,
                };
                let response = self.authorized(self.http.post(url)).json(&request).send().await?;
                ensure_success(response).await?;
                None
            }
            None => target,
        };

        let url = self.project_endpoint(&["releases"])?;
        let request = CreateReleaseRequest {
            tag_name: tag,
            name: &release.name,
            description: &description,
            git_ref,
        };
        let response = self.authorized(self.http.post(url)).json(&request).send().await?;
        let payload: ReleasePayload = ensure_success(response).await?.json().await?;

        let mut created = payload.into_release();
        if created.target_commitish.is_empty() {
            created.target_commitish = release.target_commitish.clone();
        }
        created.prerelease = release.prerelease;
        Ok(created)
    }

    async fn update_release(&self, release: &Release) -> ForgeResult<Release> {
        let description = Self::normalize_description(&release.body);
        let mut updated = self
            .write_release(release.tag_name(), &release.name, &description)
            .await?;
        updated.prerelease = release.prerelease;
        Ok(updated)
    }

    async fn delete_release(&self, release: &Release) -> ForgeResult<()> {
        let url = self.project_endpoint(&["releases", release.tag_name()])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> ForgeResult<()> {
        let url = self.project_endpoint(&["repository", "tags", tag])?;
        let response = self.authorized(self.http.get(url.clone())).send().await?;
        let existing: TagPayload = ensure_success(response).await?.json().await?;

        let response = self.authorized(self.http.delete(url)).send().await?;
        ensure_success(response).await?;

        self.retired_tags()
            .insert(existing.name, existing.message.unwrap_or_default());
        Ok(())
    }

    async fn get_assets(&self, release: &Release) -> ForgeResult<Vec<ReleaseAsset>> {
        Ok(ReleaseBody::parse(&release.body)
            .assets
            .into_iter()
            .map(|link| ReleaseAsset {
                tag_name: release.tag_name().to_string(),
                name: link.name,
                id: None,
                url: Some(link.uri),
            })
            .collect())
    }

    async fn delete_release_asset(&self, asset: &ReleaseAsset) -> ForgeResult<()> {
        let current = self.fetch_existing_release(&asset.tag_name).await?;
        let mut body = ReleaseBody::parse(&current.body);
        if !body.remove(&asset.name) {
            return Err(ForgeError::NotFound(format!(
                "asset {} in GitLab release {}",
                asset.name, asset.tag_name
            )));
        }
        self.write_release(&asset.tag_name, &current.name, &body.to_string())
            .await?;
        Ok(())
    }

    async fn upload_release_asset(
        &self,
        release: &Release,
        name: &str,
        content: Vec<u8>,
    ) -> ForgeResult<ReleaseAsset> {
        let url = self.project_endpoint(&["uploads"])?;
        let form = Form::new().part("file", Part::bytes(content).file_name(name.to_string()));
        let response = self.authorized(self.http.post(url)).multipart(form).send().await?;
        let uploaded: UploadPayload = ensure_success(response).await?.json().await?;
        debug!("Uploaded {} to {}", uploaded.alt, uploaded.url);

        // Refetch: earlier uploads in this run have rewritten the description
        let current = self.fetch_existing_release(release.tag_name()).await?;
        let mut body = ReleaseBody::parse(&current.body);
        body.upsert(DownloadLink::new(name, uploaded.url.clone()));
        self.write_release(release.tag_name(), &current.name, &body.to_string())
            .await?;

        Ok(ReleaseAsset {
            tag_name: release.tag_name().to_string(),
            name: name.to_string(),
            id: None,
            url: Some(uploaded.url),
        })
    }
}
