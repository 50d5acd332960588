use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a hosting backend.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The backend answered with a status outside 200-299
    #[error("Bad status code {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a usable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// A resource the adapter needed to complete the call is missing
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl ForgeError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ForgeError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ForgeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for the 404 answer that signals an absent release.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ForgeError::status(status.as_u16(), err.to_string()),
            None => ForgeError::Transport(err.to_string()),
        }
    }
}

impl From<octocrab::Error> for ForgeError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                ForgeError::status(source.status_code.as_u16(), source.message.clone())
            }
            other => ForgeError::Transport(other.to_string()),
        }
    }
}

pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Failures that abort an upload run.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// A backend call made while reconciling the release failed
    #[error("{action}: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: ForgeError,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No GitHub/GitLab access token, can't proceed")]
    MissingToken,

    #[error("Error splitting repo slug into owner and repo: {0}")]
    InvalidRepoSlug(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid file pattern: {0}")]
    Glob(String),
}

impl UploadError {
    /// Wrap a backend failure with what the uploader was attempting.
    pub fn remote(action: &'static str) -> impl FnOnce(ForgeError) -> UploadError {
        move |source| UploadError::Remote { action, source }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_404_counts_as_not_found() {
        assert!(ForgeError::status(404, "Not Found").is_not_found());
        assert!(!ForgeError::status(401, "Bad credentials").is_not_found());
        assert!(!ForgeError::NotFound("release".into()).is_not_found());
    }

    #[test]
    fn status_error_mentions_code() {
        let err = ForgeError::status(422, "Validation Failed");
        assert_eq!(err.to_string(), "Bad status code 422: Validation Failed");
    }
}
