use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::env::EnvSource;
use crate::config::UploadConfig;
use crate::error::UploadError;

/// Tag used for continuous releases when neither a tag nor a suffix is known.
/// "latest" is reserved by GitHub, hence not used.
pub const CONTINUOUS_TAG: &str = "continuous";

const DEFAULT_BRANCH: &str = "master";

/// Which CI system triggered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CiKind {
    Travis,
    AppVeyor,
    GitLab,
    None,
}

impl fmt::Display for CiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiKind::Travis => write!(f, "Travis CI"),
            CiKind::AppVeyor => write!(f, "AppVeyor CI"),
            CiKind::GitLab => write!(f, "GitLab CI"),
            CiKind::None => write!(f, "no CI"),
        }
    }
}

/// Normalized facts about the build that triggered this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub tag: String,
    pub commit: String,
    pub is_pull_request: bool,
    pub is_prerelease: bool,
    pub release_title: String,
    pub build_id: String,
    pub ci_kind: CiKind,
}

/// Raw per-CI facts before overrides and tag policy are applied.
struct CiFacts {
    token: String,
    branch: String,
    tag: String,
    commit: String,
    repo_slug: String,
    build_id: String,
    is_pull_request: bool,
}

fn detect(env: &impl EnvSource) -> CiKind {
    if env.value("APPVEYOR") == "True" {
        CiKind::AppVeyor
    } else if env.value("TRAVIS") == "true" {
        CiKind::Travis
    } else if env.value("GITLAB_CI") == "true" {
        CiKind::GitLab
    } else {
        CiKind::None
    }
}

fn read_facts(env: &impl EnvSource, ci_kind: CiKind) -> CiFacts {
    match ci_kind {
        CiKind::AppVeyor => CiFacts {
            token: env.value("auth_token"),
            branch: env.value("APPVEYOR_REPO_BRANCH"),
            tag: env.value("APPVEYOR_REPO_TAG_NAME"),
            commit: env.value("APPVEYOR_REPO_COMMIT"),
            repo_slug: env.value("APPVEYOR_REPO_NAME"),
            build_id: env.value("APPVEYOR_BUILD_VERSION"),
            is_pull_request: !env.value("APPVEYOR_PULL_REQUEST_NUMBER").is_empty(),
        },
        CiKind::Travis => CiFacts {
            token: env.value("GITHUB_TOKEN"),
            branch: env.value("TRAVIS_BRANCH"),
            tag: env.value("TRAVIS_TAG"),
            commit: env.value("TRAVIS_COMMIT"),
            repo_slug: env.value("TRAVIS_REPO_SLUG"),
            build_id: env.value("TRAVIS_BUILD_ID"),
            is_pull_request: env.value("TRAVIS_EVENT_TYPE") == "pull_request",
        },
        CiKind::GitLab => CiFacts {
            token: env.value("GITLAB_TOKEN"),
            branch: env.value("CI_COMMIT_REF_NAME"),
            tag: env.value("CI_COMMIT_TAG"),
            commit: env.value("CI_COMMIT_SHA"),
            repo_slug: format!(
                "{}/{}",
                env.value("CI_PROJECT_NAMESPACE"),
                env.value("CI_PROJECT_NAME")
            ),
            build_id: env.value("CI_JOB_ID"),
            is_pull_request: false,
        },
        CiKind::None => CiFacts {
            token: String::new(),
            branch: String::new(),
            tag: String::new(),
            commit: String::new(),
            repo_slug: String::new(),
            build_id: String::new(),
            is_pull_request: false,
        },
    }
}

/// Collect the build event from CI environment variables and explicit
/// overrides.
///
/// `Ok(None)` means there is nothing to do: no CI and no service override,
/// a pull request build, or an AppVeyor job without secrets.
pub fn collect(
    env: &impl EnvSource,
    overrides: &UploadConfig,
) -> Result<Option<BuildEvent>, UploadError> {
    let ci_kind = detect(env);

    if ci_kind == CiKind::None {
        if overrides.service.is_none() {
            info!("Neither Travis CI build nor AppVeyor build nor GitLab CI build. Not doing anything");
            return Ok(None);
        }
        if overrides.owner.is_none() || overrides.repo.is_none() || overrides.token.is_none() {
            return Err(UploadError::Config(
                "outside of CI the upload service, repo owner, repo and auth token must all be given"
                    .to_string(),
            ));
        }
    } else {
        info!("Running on {}", ci_kind);
    }

    let facts = read_facts(env, ci_kind);

    let token = overrides.token.clone().unwrap_or(facts.token);
    if token.is_empty() {
        if ci_kind == CiKind::AppVeyor {
            // Pull request builds from forks get no secrets on AppVeyor
            info!("No dev token for AppVeyor CI job, won't do anything");
            return Ok(None);
        }
        return Err(UploadError::MissingToken);
    }

    if facts.is_pull_request {
        info!("Current build is the one triggered by a pull request, won't do anything");
        return Ok(None);
    }

    let branch = if facts.branch.is_empty() {
        debug!("No branch info was found, fallback to \"{}\"", DEFAULT_BRANCH);
        DEFAULT_BRANCH.to_string()
    } else {
        facts.branch
    };

    info!("Commit: {}", facts.commit);

    let (owner, repo) = match (&overrides.owner, &overrides.repo) {
        (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
        (owner, repo) => {
            let (slug_owner, slug_repo) = split_repo_slug(&facts.repo_slug)?;
            (
                owner.clone().unwrap_or(slug_owner),
                repo.clone().unwrap_or(slug_repo),
            )
        }
    };

    let policy = TagPolicy::resolve(&facts.tag, overrides.suffix());
    debug!("Release tag: {}", policy.tag);

    Ok(Some(BuildEvent {
        token,
        owner,
        repo,
        branch,
        tag: policy.tag,
        commit: facts.commit,
        is_pull_request: false,
        is_prerelease: policy.is_prerelease,
        release_title: policy.title,
        build_id: facts.build_id,
        ci_kind,
    }))
}

fn split_repo_slug(slug: &str) -> Result<(String, String), UploadError> {
    match slug.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(UploadError::InvalidRepoSlug(slug.to_string())),
    }
}

/// Effective tag, title and prerelease flag for a CI tag and suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    pub tag: String,
    pub title: String,
    pub is_prerelease: bool,
}

impl TagPolicy {
    pub fn resolve(ci_tag: &str, suffix: &str) -> Self {
        let is_continuous_tag = ci_tag.starts_with(CONTINUOUS_TAG);

        if !ci_tag.is_empty() && !is_continuous_tag && (suffix.is_empty() || suffix == ci_tag) {
            return TagPolicy {
                tag: ci_tag.to_string(),
                title: format!("Release build ({})", ci_tag),
                is_prerelease: false,
            };
        }

        if !suffix.is_empty() {
            info!("Suffix = {}", suffix);
            let tag = format!("{}-{}", CONTINUOUS_TAG, suffix);
            return TagPolicy {
                title: format!("Continuous build ({})", tag),
                tag,
                is_prerelease: true,
            };
        }

        TagPolicy {
            tag: CONTINUOUS_TAG.to_string(),
            title: "Continuous build".to_string(),
            is_prerelease: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ci_tag_is_kept_for_regular_release() {
        let policy = TagPolicy::resolve("v1.2.0", "");
        assert_eq!(policy.tag, "v1.2.0");
        assert_eq!(policy.title, "Release build (v1.2.0)");
        assert!(!policy.is_prerelease);
    }

    #[test]
    fn suffix_equal_to_tag_keeps_regular_release() {
        let policy = TagPolicy::resolve("v1.2.0", "v1.2.0");
        assert_eq!(policy.tag, "v1.2.0");
        assert!(!policy.is_prerelease);
    }

    #[test]
    fn suffix_produces_continuous_prerelease() {
        let policy = TagPolicy::resolve("", "master");
        assert_eq!(policy.tag, "continuous-master");
        assert_eq!(policy.title, "Continuous build (continuous-master)");
        assert!(policy.is_prerelease);

        let policy = TagPolicy::resolve("v1.2.0", "develop");
        assert_eq!(policy.tag, "continuous-develop");
        assert!(policy.is_prerelease);
    }

    #[test]
    fn no_tag_and_no_suffix_uses_fixed_continuous_tag() {
        let policy = TagPolicy::resolve("", "");
        assert_eq!(policy.tag, "continuous");
        assert_eq!(policy.title, "Continuous build");
        assert!(policy.is_prerelease);
    }

    #[test]
    fn continuous_ci_tag_collapses_to_fixed_tag() {
        for ci_tag in ["continuous", "continuous-master"] {
            let policy = TagPolicy::resolve(ci_tag, "");
            assert_eq!(policy.tag, "continuous");
            assert_eq!(policy.title, "Continuous build");
            assert!(policy.is_prerelease);
        }
    }

    #[test]
    fn repo_slug_needs_exactly_two_parts() {
        assert_eq!(
            split_repo_slug("owner/repo").unwrap(),
            ("owner".to_string(), "repo".to_string())
        );
        assert!(split_repo_slug("owner").is_err());
        assert!(split_repo_slug("a/b/c").is_err());
        assert!(split_repo_slug("/repo").is_err());
    }
}
