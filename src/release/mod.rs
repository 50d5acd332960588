pub mod body;
pub mod build_log;
pub mod types;

pub use body::{DownloadLink, ReleaseBody, DOWNLOADS_HEADER};
pub use types::{Release, ReleaseAsset};
