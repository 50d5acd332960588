use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use release_uploader::ci::{self, ProcessEnv};
use release_uploader::config::{ForgeKind, UploadConfig};
use release_uploader::forge;
use release_uploader::uploader::{files, ReleaseUploader, UploadOptions};
use release_uploader::UploadError;

/// Long options older CI scripts still spell with a single dash.
const LONG_FLAGS: &[&str] = &[
    "suffix",
    "relbody",
    "preponly",
    "upload-to-service",
    "upload-to-repo",
    "upload-to-repo-owner",
    "upload-auth-token",
    "config",
    "verbose",
];

#[derive(Parser)]
#[command(name = "ci-upload")]
#[command(about = "Upload CI build artifacts to a GitHub or GitLab release")]
struct Cli {
    /// Suffix for the tag of continuous releases (continuous-<suffix>)
    #[arg(long)]
    suffix: Option<String>,

    /// Body of newly created releases
    #[arg(long)]
    relbody: Option<String>,

    /// Only create or update the release, upload nothing
    #[arg(long)]
    preponly: bool,

    /// Hosting service to upload to (github or gitlab)
    #[arg(long = "upload-to-service")]
    service: Option<ForgeKind>,

    /// Repository name, required with --upload-to-service
    #[arg(long = "upload-to-repo")]
    repo: Option<String>,

    /// Repository owner, required with --upload-to-service
    #[arg(long = "upload-to-repo-owner")]
    owner: Option<String>,

    /// Access token, overrides the one found in the CI environment
    #[arg(long = "upload-auth-token")]
    token: Option<String>,

    /// TOML file with default settings
    #[arg(long, env = "CI_UPLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    verbose: bool,

    /// Files to upload, required unless prep-only is set here or in the config
    files: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> UploadConfig {
        UploadConfig {
            service: self.service,
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            token: self.token.clone(),
            suffix: self.suffix.clone(),
            release_body: self.relbody.clone(),
            prep_only: self.preponly,
            ..UploadConfig::default()
        }
    }
}

/// Files may only be omitted when the run stops after preparing the release.
fn require_files(files: &[String], config: &UploadConfig) -> Result<(), UploadError> {
    if files.is_empty() && !config.prep_only {
        return Err(UploadError::Config(
            "no files to upload, pass some or enable prep-only".to_string(),
        ));
    }
    Ok(())
}

/// Rewrite `-flag` and `-flag=value` to their double-dash form.
fn normalize_legacy_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args()));

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let file_config = match &cli.config {
        Some(path) => UploadConfig::load(path)?,
        None => UploadConfig::default(),
    };
    let config = file_config.merge(cli.overrides());
    require_files(&cli.files, &config)?;

    let Some(event) = ci::collect(&ProcessEnv, &config)? else {
        return Ok(());
    };

    let paths = files::expand(&cli.files, cfg!(windows))?;
    let kind = forge::select_kind(config.service, event.ci_kind);
    let client = forge::connect(kind, &event, &config).await?;

    let uploader = ReleaseUploader::new(
        client,
        UploadOptions {
            release_body: config.release_body().to_string(),
            prep_only: config.prep_only,
        },
    );
    let report = uploader.run(&event, &paths).await?;

    if report.recreated {
        info!("Release {} was recreated for commit {}", event.tag, event.commit);
    }
    for path in &report.skipped {
        info!("Skipped {}", path.display());
    }
    Ok(())
}
