use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::UploadError;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_UPLOAD_URL: &str = "https://uploads.github.com";
pub const DEFAULT_GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

/// Hosting service a release lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    GitHub,
    GitLab,
}

impl std::str::FromStr for ForgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ForgeKind::GitHub),
            "gitlab" => Ok(ForgeKind::GitLab),
            _ => Err(format!("Unknown upload service: {}", s)),
        }
    }
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeKind::GitHub => write!(f, "github"),
            ForgeKind::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Upload settings. Every field is optional so a TOML file and the command
/// line can each supply a subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub service: Option<ForgeKind>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub suffix: Option<String>,
    pub release_body: Option<String>,
    pub prep_only: bool,
    pub api_url: Option<String>,
    pub upload_url: Option<String>,
}

impl UploadConfig {
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path).map_err(|e| UploadError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| UploadError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Overlay `other` on top of `self`: values present in `other` win.
    pub fn merge(self, other: UploadConfig) -> Self {
        UploadConfig {
            service: other.service.or(self.service),
            owner: non_empty(other.owner).or(self.owner),
            repo: non_empty(other.repo).or(self.repo),
            token: non_empty(other.token).or(self.token),
            suffix: non_empty(other.suffix).or(self.suffix),
            release_body: non_empty(other.release_body).or(self.release_body),
            prep_only: other.prep_only || self.prep_only,
            api_url: non_empty(other.api_url).or(self.api_url),
            upload_url: non_empty(other.upload_url).or(self.upload_url),
        }
    }

    pub fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or("")
    }

    pub fn release_body(&self) -> &str {
        self.release_body.as_deref().unwrap_or("")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
