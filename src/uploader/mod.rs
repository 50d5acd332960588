pub mod files;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ci::BuildEvent;
use crate::error::UploadError;
use crate::forge::ForgeClient;
use crate::release::{build_log, Release, ReleaseAsset};

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Body for releases created by this run
    pub release_body: String,
    /// Stop once the release exists and carries the build line
    pub prep_only: bool,
}

/// What a run did to the release.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub release: Release,
    pub created: bool,
    /// The old release pointed at another commit and was deleted first
    pub recreated: bool,
    pub uploaded: Vec<ReleaseAsset>,
    pub skipped: Vec<PathBuf>,
}

struct PreparedRelease {
    release: Release,
    assets: Vec<ReleaseAsset>,
    created: bool,
    recreated: bool,
}

/// Reconciles the release for one build and uploads its files.
pub struct ReleaseUploader {
    client: Arc<dyn ForgeClient>,
    options: UploadOptions,
}

impl ReleaseUploader {
    pub fn new(client: Arc<dyn ForgeClient>, options: UploadOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(
        &self,
        event: &BuildEvent,
        files: &[PathBuf],
    ) -> Result<UploadReport, UploadError> {
        info!(
            "Uploading to {} release {} of {}/{}",
            self.client.kind(),
            event.tag,
            event.owner,
            event.repo
        );
        let prepared = self.prepare_release(event).await?;

        let mut report = UploadReport {
            release: prepared.release,
            created: prepared.created,
            recreated: prepared.recreated,
            uploaded: Vec::new(),
            skipped: Vec::new(),
        };

        if self.options.prep_only {
            info!("Release {} prepared, skipping uploads", event.tag);
            return Ok(report);
        }

        let mut existing = prepared.assets;
        for path in files {
            match self.upload_file(&report.release, &mut existing, path).await? {
                Some(asset) => report.uploaded.push(asset),
                None => report.skipped.push(path.clone()),
            }
        }

        info!(
            "Uploaded {} file(s) to release {}",
            report.uploaded.len(),
            event.tag
        );
        Ok(report)
    }

    /// Make sure a release for `event.tag` exists, points at the build's
    /// commit and carries the build log line.
    async fn prepare_release(&self, event: &BuildEvent) -> Result<PreparedRelease, UploadError> {
        let mut existing = self
            .client
            .get_release_by_tag(&event.tag)
            .await
            .map_err(UploadError::remote("Failed to fetch release information"))?;

        let mut recreated = false;
        if let Some(release) = existing.as_ref().filter(|r| is_stale(r, event)) {
            info!(
                "Release {} targets commit {}, build is for {}; recreating it",
                event.tag, release.target_commitish, event.commit
            );
            self.client
                .delete_release(release)
                .await
                .map_err(UploadError::remote("Failed to delete the outdated release"))?;
            if event.is_prerelease {
                self.delete_tag(&event.tag).await?;
            }
            existing = None;
            recreated = true;
        }

        match existing {
            Some(mut release) => {
                debug!("Release {} already exists", event.tag);
                let assets = self
                    .client
                    .get_assets(&release)
                    .await
                    .map_err(UploadError::remote("Failed to list release assets"))?;
                release.body = build_log::merge(&release.body, event);
                let release = self
                    .client
                    .update_release(&release)
                    .await
                    .map_err(UploadError::remote("Bad response on attempt to update the release"))?;
                Ok(PreparedRelease {
                    release,
                    assets,
                    created: false,
                    recreated,
                })
            }
            None => {
                info!("Creating new release {}", event.tag);
                let draft = self.client.new_release(&self.options.release_body, event);
                let release = self
                    .client
                    .create_release(&draft)
                    .await
                    .map_err(UploadError::remote("Bad response on attempt to create the new release"))?;
                Ok(PreparedRelease {
                    release,
                    assets: Vec::new(),
                    created: true,
                    recreated,
                })
            }
        }
    }

    async fn delete_tag(&self, tag: &str) -> Result<(), UploadError> {
        match self.client.delete_tag(tag).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                warn!("Tag {} is already gone", tag);
                Ok(())
            }
            Err(err) => Err(UploadError::remote("Failed to delete the tag")(err)),
        }
    }

    /// Upload one file, replacing any asset of the same name.
    ///
    /// Returns `None` when the path is not a regular file.
    async fn upload_file(
        &self,
        release: &Release,
        existing: &mut Vec<ReleaseAsset>,
        path: &Path,
    ) -> Result<Option<ReleaseAsset>, UploadError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        if !metadata.is_file() {
            info!("Skipping {}, not a regular file", path.display());
            return Ok(None);
        }

        let name = asset_name(path)?;
        while let Some(position) = existing.iter().position(|asset| asset.name == name) {
            info!("Deleting existing release asset {}", name);
            self.client
                .delete_release_asset(&existing[position])
                .await
                .map_err(UploadError::remote("Bad response on attempt to delete the old asset"))?;
            existing.remove(position);
        }

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        info!("Uploading {} ({} bytes)", path.display(), content.len());
        let asset = self
            .client
            .upload_release_asset(release, &name, content)
            .await
            .map_err(UploadError::remote("Bad response on attempt to upload the asset"))?;

        existing.push(asset.clone());
        Ok(Some(asset))
    }
}

/// An existing release is replaced when it was made for a different commit.
/// Either side missing a commit means there is nothing to compare.
fn is_stale(release: &Release, event: &BuildEvent) -> bool {
    !release.target_commitish.is_empty()
        && !event.commit.is_empty()
        && release.target_commitish != event.commit
}

fn asset_name(path: &Path) -> Result<String, UploadError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::Config(format!("{} does not name a file", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::CiKind;

    fn event(commit: &str) -> BuildEvent {
        BuildEvent {
            token: "t".into(),
            owner: "o".into(),
            repo: "r".into(),
            branch: "master".into(),
            tag: "continuous".into(),
            commit: commit.into(),
            is_pull_request: false,
            is_prerelease: true,
            release_title: "Continuous build".into(),
            build_id: String::new(),
            ci_kind: CiKind::Travis,
        }
    }

    #[test]
    fn stale_only_when_both_commits_known_and_differ() {
        let mut release = Release::new("continuous");
        release.target_commitish = "aaa".into();
        assert!(is_stale(&release, &event("bbb")));
        assert!(!is_stale(&release, &event("aaa")));
        assert!(!is_stale(&release, &event("")));

        release.target_commitish.clear();
        assert!(!is_stale(&release, &event("bbb")));
    }

    #[test]
    fn asset_name_is_base_name() {
        assert_eq!(asset_name(Path::new("out/app.zip")).unwrap(), "app.zip");
        assert!(asset_name(Path::new("/")).is_err());
    }
}
