//! In-memory backend with GitHub-like semantics (testing only)
//!
//! Releases get numeric ids from a per-instance counter, assets are stored
//! with their content, and every call is journaled so tests can assert on
//! ordering.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::ForgeClient;
use crate::config::ForgeKind;
use crate::error::{ForgeError, ForgeResult};
use crate::release::{Release, ReleaseAsset};

/// One call made against a `MemoryForge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetRelease(String),
    CreateRelease(String),
    UpdateRelease(String),
    DeleteRelease(String),
    DeleteTag(String),
    ListAssets(String),
    DeleteAsset(String),
    UploadAsset(String),
}

#[derive(Debug, Clone)]
struct StoredAsset {
    id: u64,
    name: String,
    content: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredRelease {
    release: Release,
    assets: Vec<StoredAsset>,
}

#[derive(Debug, Default)]
struct MemoryState {
    releases: Vec<StoredRelease>,
    tags: Vec<String>,
    next_id: u64,
    journal: Vec<Operation>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn release_index(&self, release: &Release) -> ForgeResult<usize> {
        self.releases
            .iter()
            .position(|stored| match release.id {
                Some(id) => stored.release.id == Some(id),
                None => stored.release.tag_name() == release.tag_name(),
            })
            .ok_or_else(|| ForgeError::status(404, "Not Found"))
    }
}

#[derive(Debug, Default)]
pub struct MemoryForge {
    token: String,
    state: Mutex<MemoryState>,
}

impl MemoryForge {
    pub fn new(token: impl Into<String>) -> Self {
        MemoryForge {
            token: token.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Seed an existing release together with its tag and assets.
    pub fn with_release(self, release: Release, assets: &[(&str, &[u8])]) -> Self {
        {
            let mut state = self.state();
            let id = state.allocate_id();
            let stored_assets = assets
                .iter()
                .map(|(name, content)| StoredAsset {
                    id: state.allocate_id(),
                    name: name.to_string(),
                    content: content.to_vec(),
                })
                .collect();
            if !state.tags.iter().any(|tag| tag == release.tag_name()) {
                state.tags.push(release.tag_name().to_string());
            }
            state.releases.push(StoredRelease {
                release: release.with_id(id),
                assets: stored_assets,
            });
        }
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn authorize(&self) -> ForgeResult<()> {
        if self.token.is_empty() {
            return Err(ForgeError::status(401, "Bad credentials"));
        }
        Ok(())
    }

    pub fn releases(&self) -> Vec<Release> {
        self.state()
            .releases
            .iter()
            .map(|stored| stored.release.clone())
            .collect()
    }

    pub fn release(&self, tag: &str) -> Option<Release> {
        self.state()
            .releases
            .iter()
            .find(|stored| stored.release.tag_name() == tag)
            .map(|stored| stored.release.clone())
    }

    /// Names of the assets attached to the release tagged `tag`, in order.
    pub fn asset_names(&self, tag: &str) -> Vec<String> {
        self.state()
            .releases
            .iter()
            .find(|stored| stored.release.tag_name() == tag)
            .map(|stored| stored.assets.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn asset_content(&self, tag: &str, name: &str) -> Option<Vec<u8>> {
        self.state()
            .releases
            .iter()
            .find(|stored| stored.release.tag_name() == tag)
            .and_then(|stored| stored.assets.iter().find(|a| a.name == name))
            .map(|asset| asset.content.clone())
    }

    pub fn tags(&self) -> Vec<String> {
        self.state().tags.clone()
    }

    pub fn journal(&self) -> Vec<Operation> {
        self.state().journal.clone()
    }
}

#[async_trait]
impl ForgeClient for MemoryForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    async fn get_release_by_tag(&self, tag: &str) -> ForgeResult<Option<Release>> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::GetRelease(tag.to_string()));
        Ok(state
            .releases
            .iter()
            .find(|stored| stored.release.tag_name() == tag)
            .map(|stored| stored.release.clone()))
    }

    async fn create_release(&self, release: &Release) -> ForgeResult<Release> {
        self.authorize()?;
        if release.tag_name().is_empty() {
            return Err(ForgeError::status(400, "Missing tag name"));
        }
        if release.name.is_empty() {
            return Err(ForgeError::status(400, "Missing release name"));
        }

        let mut state = self.state();
        state.journal.push(Operation::CreateRelease(release.tag_name().to_string()));
        if state
            .releases
            .iter()
            .any(|stored| stored.release.tag_name() == release.tag_name())
        {
            return Err(ForgeError::status(422, "Validation Failed: already_exists"));
        }

        let id = state.allocate_id();
        let created = release.clone().with_id(id);
        if !state.tags.iter().any(|tag| tag == release.tag_name()) {
            state.tags.push(release.tag_name().to_string());
        }
        state.releases.push(StoredRelease {
            release: created.clone(),
            assets: Vec::new(),
        });
        Ok(created)
    }

    async fn update_release(&self, release: &Release) -> ForgeResult<Release> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::UpdateRelease(release.tag_name().to_string()));
        let index = state.release_index(release)?;
        let stored = &mut state.releases[index].release;
        stored.name = release.name.clone();
        stored.body = release.body.clone();
        stored.target_commitish = release.target_commitish.clone();
        stored.draft = release.draft;
        stored.prerelease = release.prerelease;
        Ok(stored.clone())
    }

    async fn delete_release(&self, release: &Release) -> ForgeResult<()> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::DeleteRelease(release.tag_name().to_string()));
        let index = state.release_index(release)?;
        state.releases.remove(index);
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> ForgeResult<()> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::DeleteTag(tag.to_string()));
        let index = state
            .tags
            .iter()
            .position(|existing| existing == tag)
            .ok_or_else(|| ForgeError::status(404, "Not Found"))?;
        state.tags.remove(index);
        Ok(())
    }

    async fn get_assets(&self, release: &Release) -> ForgeResult<Vec<ReleaseAsset>> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::ListAssets(release.tag_name().to_string()));
        let index = state.release_index(release)?;
        let stored = &state.releases[index];
        Ok(stored
            .assets
            .iter()
            .map(|asset| ReleaseAsset {
                tag_name: stored.release.tag_name().to_string(),
                name: asset.name.clone(),
                id: Some(asset.id),
                url: None,
            })
            .collect())
    }

    async fn delete_release_asset(&self, asset: &ReleaseAsset) -> ForgeResult<()> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::DeleteAsset(asset.name.clone()));
        let id = asset
            .id
            .ok_or_else(|| ForgeError::InvalidResponse(format!("asset {} has no id", asset.name)))?;
        for stored in state.releases.iter_mut() {
            if let Some(position) = stored.assets.iter().position(|a| a.id == id) {
                stored.assets.remove(position);
                return Ok(());
            }
        }
        Err(ForgeError::status(404, "Not Found"))
    }

    async fn upload_release_asset(
        &self,
        release: &Release,
        name: &str,
        content: Vec<u8>,
    ) -> ForgeResult<ReleaseAsset> {
        self.authorize()?;
        let mut state = self.state();
        state.journal.push(Operation::UploadAsset(name.to_string()));
        let index = state.release_index(release)?;
        if state.releases[index].assets.iter().any(|a| a.name == name) {
            return Err(ForgeError::status(422, "Validation Failed: already_exists"));
        }
        let id = state.allocate_id();
        state.releases[index].assets.push(StoredAsset {
            id,
            name: name.to_string(),
            content,
        });
        Ok(ReleaseAsset {
            tag_name: release.tag_name().to_string(),
            name: name.to_string(),
            id: Some(id),
            url: None,
        })
    }
}
