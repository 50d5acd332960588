//! Capability set every hosting backend provides.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::ci::{BuildEvent, CiKind};
use crate::config::{ForgeKind, UploadConfig};
use crate::config::{DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_UPLOAD_URL, DEFAULT_GITLAB_API_URL};
use crate::error::{ForgeError, ForgeResult};
use crate::github::client::GitHubClient;
use crate::gitlab::client::GitLabClient;
use crate::release::{build_log, Release, ReleaseAsset};

pub use memory::MemoryForge;

/// Operations the uploader needs from a hosting backend.
///
/// Implementations hide how releases and assets are stored: callers only
/// ever see `Release` and `ReleaseAsset` values.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    fn kind(&self) -> ForgeKind;

    /// Build an unsaved release for `event`, its body already carrying the
    /// build log line.
    fn new_release(&self, body: &str, event: &BuildEvent) -> Release {
        let mut release = Release::for_event(body, event);
        release.body = build_log::merge(&release.body, event);
        release
    }

    /// `Ok(None)` when the backend answers 404 for the tag.
    async fn get_release_by_tag(&self, tag: &str) -> ForgeResult<Option<Release>>;

    async fn create_release(&self, release: &Release) -> ForgeResult<Release>;

    async fn update_release(&self, release: &Release) -> ForgeResult<Release>;

    async fn delete_release(&self, release: &Release) -> ForgeResult<()>;

    async fn delete_tag(&self, tag: &str) -> ForgeResult<()>;

    async fn get_assets(&self, release: &Release) -> ForgeResult<Vec<ReleaseAsset>>;

    async fn delete_release_asset(&self, asset: &ReleaseAsset) -> ForgeResult<()>;

    async fn upload_release_asset(
        &self,
        release: &Release,
        name: &str,
        content: Vec<u8>,
    ) -> ForgeResult<ReleaseAsset>;
}

/// `base` with `segments` appended, each percent-encoded as one path segment.
pub fn endpoint(base: &str, segments: &[&str]) -> ForgeResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| ForgeError::Transport(format!("invalid base url {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ForgeError::Transport(format!("invalid base url {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Pass 2xx responses through, turn any other status into
/// `ForgeError::Status` carrying the response text.
pub async fn ensure_success(response: reqwest::Response) -> ForgeResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = status.canonical_reason().unwrap_or("");
    let text = response.text().await.unwrap_or_default();
    let message = if text.is_empty() {
        reason.to_string()
    } else {
        format!("{} {}", reason, text)
    };
    Err(ForgeError::status(status.as_u16(), message.trim()))
}

/// Backend for this run: an explicit service wins, otherwise GitLab CI jobs
/// talk to GitLab and everything else to GitHub.
pub fn select_kind(service: Option<ForgeKind>, ci_kind: CiKind) -> ForgeKind {
    match (service, ci_kind) {
        (Some(kind), _) => kind,
        (None, CiKind::GitLab) => ForgeKind::GitLab,
        (None, _) => ForgeKind::GitHub,
    }
}

/// Create the client for `kind` authenticated with the event's token.
pub async fn connect(
    kind: ForgeKind,
    event: &BuildEvent,
    config: &UploadConfig,
) -> ForgeResult<Arc<dyn ForgeClient>> {
    match kind {
        ForgeKind::GitHub => {
            let client = GitHubClient::new(
                event.token.clone(),
                event.owner.clone(),
                event.repo.clone(),
                config.api_url.as_deref().unwrap_or(DEFAULT_GITHUB_API_URL),
                config.upload_url.as_deref().unwrap_or(DEFAULT_GITHUB_UPLOAD_URL),
            )
            .await?;
            Ok(Arc::new(client))
        }
        ForgeKind::GitLab => {
            let client = GitLabClient::new(
                event.token.clone(),
                event.owner.clone(),
                event.repo.clone(),
                config.api_url.as_deref().unwrap_or(DEFAULT_GITLAB_API_URL),
            )?;
            Ok(Arc::new(client))
        }
    }
}
