use serde::{Deserialize, Serialize};

use crate::ci::BuildEvent;

/// A release on a hosting backend, keyed by its tag.
///
/// The tag is fixed for the lifetime of the value; every other attribute may
/// be edited before the release is pushed back through a `ForgeClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Backend identifier, absent on backends that key releases by tag only.
    pub id: Option<u64>,
    tag_name: String,
    pub name: String,
    /// Release notes; the GitLab "description".
    pub body: String,
    pub target_commitish: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl Release {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Release {
            id: None,
            tag_name: tag_name.into(),
            name: String::new(),
            body: String::new(),
            target_commitish: String::new(),
            draft: false,
            prerelease: false,
        }
    }

    /// A fresh release for the build, not yet created remotely.
    pub fn for_event(body: &str, event: &BuildEvent) -> Self {
        Release {
            id: None,
            tag_name: event.tag.clone(),
            name: event.release_title.clone(),
            body: body.to_string(),
            target_commitish: event.commit.clone(),
            draft: false,
            prerelease: event.is_prerelease,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }
}

/// A named file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Tag of the owning release, enough to address it without a refetch.
    pub tag_name: String,
    pub name: String,
    pub id: Option<u64>,
    pub url: Option<String>,
}

impl ReleaseAsset {
    pub fn new(tag_name: impl Into<String>, name: impl Into<String>) -> Self {
        ReleaseAsset {
            tag_name: tag_name.into(),
            name: name.into(),
            id: None,
            url: None,
        }
    }
}
