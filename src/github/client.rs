use async_trait::async_trait;
use octocrab::models;
use octocrab::Octocrab;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use super::types::AssetPayload;
use crate::config::ForgeKind;
use crate::error::{ForgeError, ForgeResult};
use crate::forge::{endpoint, ensure_success, ForgeClient};
use crate::release::{Release, ReleaseAsset};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("release-uploader/", env!("CARGO_PKG_VERSION"));

/// Structured-storage backend: releases and assets carry numeric ids.
///
/// Release CRUD goes through octocrab. Tag ref deletion, asset listing and
/// asset uploads hit the REST endpoints directly, uploads on their own host.
pub struct GitHubClient {
    client: Octocrab,
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    api_url: String,
    upload_url: String,
}

impl GitHubClient {
    pub async fn new(
        token: String,
        owner: String,
        repo: String,
        api_url: &str,
        upload_url: &str,
    ) -> ForgeResult<Self> {
        let client = Octocrab::builder()
            .personal_token(token.clone())
            .base_uri(api_url)?
            .build()?;
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            http,
            token,
            owner,
            repo,
            api_url: api_url.to_string(),
            upload_url: upload_url.to_string(),
        })
    }

    fn repo_endpoint(&self, base: &str, rest: &[&str]) -> ForgeResult<reqwest::Url> {
        let mut segments = vec!["repos", self.owner.as_str(), self.repo.as_str()];
        segments.extend_from_slice(rest);
        endpoint(base, &segments)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
    }

    /// Commit the tag points at. GitHub only exposes it on the tag object,
    /// not on the release.
    async fn tag_commit(&self, tag: &str) -> ForgeResult<String> {
        let tags = self
            .client
            .repos(&self.owner, &self.repo)
            .list_tags()
            .per_page(100)
            .send()
            .await?;

        match tags.items.into_iter().find(|t| t.name == tag) {
            Some(found) => Ok(found.commit.sha),
            None => {
                warn!("Failed to locate tag {} among repository tags", tag);
                Ok(String::new())
            }
        }
    }

    fn release_id(release: &Release) -> ForgeResult<u64> {
        release.id.ok_or_else(|| {
            ForgeError::InvalidResponse(format!("release {} has no id", release.tag_name()))
        })
    }
}

fn to_release(release: models::repos::Release, target_commitish: String) -> Release {
    let mut converted = Release::new(release.tag_name).with_id(release.id.0);
    converted.name = release.name.unwrap_or_default();
    converted.body = release.body.unwrap_or_default();
    converted.target_commitish = target_commitish;
    converted.draft = release.draft;
    converted.prerelease = release.prerelease;
    converted
}

#[async_trait]
impl ForgeClient for GitHubClient {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    async fn get_release_by_tag(&self, tag: &str) -> ForgeResult<Option<Release>> {
        let result = self
            .client
            .repos(&self.owner, &self.repo)
            .releases()
            .get_by_tag(tag)
            .await;

        let release = match result {
            Ok(release) => release,
            Err(octocrab::Error::GitHub { source, .. })
                if source.status_code.as_u16() == 404 || source.message.contains("Not Found") =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let target_commitish = self.tag_commit(tag).await?;
        Ok(Some(to_release(release, target_commitish)))
    }

    async fn create_release(&self, release: &Release) -> ForgeResult<Release> {
        let repo = self.client.repos(&self.owner, &self.repo);
        let releases = repo.releases();
        let mut builder = releases
            .create(release.tag_name())
            .name(&release.name)
            .body(&release.body)
            .draft(release.draft)
            .prerelease(release.prerelease);
        if !release.target_commitish.is_empty() {
            builder = builder.target_commitish(&release.target_commitish);
        }
        let created = builder.send().await?;
        debug!("Created GitHub release {}", created.id.0);
        Ok(to_release(created, release.target_commitish.clone()))
    }

    async fn update_release(&self, release: &Release) -> ForgeResult<Release> {
        let id = Self::release_id(release)?;
        let updated = self
            .client
            .repos(&self.owner, &self.repo)
            .releases()
            .update(id)
            .name(&release.name)
            .body(&release.body)
            .send()
            .await?;
        Ok(to_release(updated, release.target_commitish.clone()))
    }

    async fn delete_release(&self, release: &Release) -> ForgeResult<()> {
        let id = Self::release_id(release)?;
        self.client
            .repos(&self.owner, &self.repo)
            .releases()
            .delete(id)
            .await?;
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> ForgeResult<()> {
        // No dedicated tag API; the tag is removed through its git ref
        let url = self.repo_endpoint(&self.api_url, &["git", "refs", "tags", tag])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn get_assets(&self, release: &Release) -> ForgeResult<Vec<ReleaseAsset>> {
        let id = Self::release_id(release)?.to_string();
        let mut url = self.repo_endpoint(&self.api_url, &["releases", &id, "assets"])?;
        url.query_pairs_mut().append_pair("per_page", "100");
        let response = self.authorized(self.http.get(url)).send().await?;
        let assets: Vec<AssetPayload> = ensure_success(response).await?.json().await?;
        Ok(assets
            .into_iter()
            .map(|asset| asset.into_asset(release.tag_name()))
            .collect())
    }

    async fn delete_release_asset(&self, asset: &ReleaseAsset) -> ForgeResult<()> {
        let id = asset
            .id
            .ok_or_else(|| ForgeError::InvalidResponse(format!("asset {} has no id", asset.name)))?
            .to_string();
        let url = self.repo_endpoint(&self.api_url, &["releases", "assets", &id])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn upload_release_asset(
        &self,
        release: &Release,
        name: &str,
        content: Vec<u8>,
    ) -> ForgeResult<ReleaseAsset> {
        let id = Self::release_id(release)?.to_string();
        let mut url = self.repo_endpoint(&self.upload_url, &["releases", &id, "assets"])?;
        url.query_pairs_mut().append_pair("name", name);
        let response = self
            .authorized(self.http.post(url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;
        let asset: AssetPayload = ensure_success(response).await?.json().await?;
        Ok(asset.into_asset(release.tag_name()))
    }
}
