pub mod types;

pub use types::{
    ForgeKind, UploadConfig, DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_UPLOAD_URL,
    DEFAULT_GITLAB_API_URL,
};
