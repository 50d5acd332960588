//! Publish CI build artifacts to a GitHub or GitLab release.
//!
//! One release per tag is created or refreshed for the current build, its
//! body gets a link to the build log, and the given files replace any
//! same-named assets.

pub mod ci;
pub mod config;
pub mod error;
pub mod forge;
pub mod github;
pub mod gitlab;
pub mod release;
pub mod uploader;

pub use error::{ForgeError, UploadError};
pub use forge::ForgeClient;
pub use uploader::{ReleaseUploader, UploadOptions, UploadReport};
