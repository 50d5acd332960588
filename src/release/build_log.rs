//! The "CI build log" line kept up to date inside a release body.
//!
//! Each CI system owns exactly one line. Parallel jobs on different CI
//! systems therefore never overwrite each other's line.

use crate::ci::{BuildEvent, CiKind};

/// Prefix identifying this CI system's log line for the event's repository.
pub fn line_prefix(event: &BuildEvent) -> Option<String> {
    let (owner, repo) = (&event.owner, &event.repo);
    match event.ci_kind {
        CiKind::Travis => Some(format!(
            "Travis CI build log: https://travis-ci.org/{}/{}/builds/",
            owner, repo
        )),
        CiKind::AppVeyor => Some(format!(
            "AppVeyor CI build log: https://ci.appveyor.com/project/{}/{}/build",
            owner, repo
        )),
        CiKind::GitLab => Some(format!(
            "GitLab CI build log: https://gitlab.com/{}/{}/builds/",
            owner, repo
        )),
        CiKind::None => None,
    }
}

/// The full log line for this build; empty when no build id is known.
pub fn line_for(event: &BuildEvent) -> String {
    if event.build_id.is_empty() {
        return String::new();
    }
    match event.ci_kind {
        CiKind::Travis => format!(
            "Travis CI build log: https://travis-ci.org/{}/{}/builds/{}/",
            event.owner, event.repo, event.build_id
        ),
        CiKind::AppVeyor => format!(
            "AppVeyor CI build log: https://ci.appveyor.com/project/{}/{}/build/{}",
            event.owner, event.repo, event.build_id
        ),
        CiKind::GitLab => format!(
            "GitLab CI build log: https://gitlab.com/{}/{}/builds/{}",
            event.owner, event.repo, event.build_id
        ),
        CiKind::None => String::new(),
    }
}

/// Upsert the event's build log line into `body`.
///
/// Lines matching this CI system's prefix are replaced, every other line is
/// kept in order, and the line is appended when absent. Without a build id
/// the body is returned untouched.
pub fn merge(body: &str, event: &BuildEvent) -> String {
    let expected = line_for(event);
    let Some(prefix) = line_prefix(event).filter(|_| !expected.is_empty()) else {
        return body.to_string();
    };

    let mut merged = String::with_capacity(body.len() + expected.len() + 1);
    let mut found = false;
    for line in body.lines() {
        if line.starts_with(&prefix) {
            found = true;
            merged.push_str(&expected);
        } else {
            merged.push_str(line);
        }
        merged.push('\n');
    }

    if !found {
        merged.push_str(&expected);
        merged.push('\n');
    }

    merged
}
