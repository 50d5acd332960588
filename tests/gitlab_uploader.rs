use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mockito::{Matcher, Server};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use release_uploader::ci::{BuildEvent, CiKind};
use release_uploader::gitlab::GitLabClient;
use release_uploader::release::{ReleaseBody, DOWNLOADS_HEADER};
use release_uploader::{ReleaseUploader, UploadOptions};

const RELEASE: &str = "/projects/group%2Fproject/releases/continuous";

fn gitlab_event() -> BuildEvent {
    BuildEvent {
        token: "gl-token".into(),
        owner: "group".into(),
        repo: "project".into(),
        branch: "master".into(),
        tag: "continuous".into(),
        commit: "abc123".into(),
        is_pull_request: false,
        is_prerelease: true,
        release_title: "Continuous build".into(),
        build_id: "7".into(),
        ci_kind: CiKind::GitLab,
    }
}

fn release_json(description: &str) -> Vec<u8> {
    json!({
        "tag_name": "continuous",
        "name": "Continuous build",
        "description": description,
        "commit": { "id": "abc123" },
    })
    .to_string()
    .into_bytes()
}

/// A GitLab release whose description is updated by every PUT, recording
/// each description written.
struct FakeRelease {
    description: Arc<Mutex<String>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl FakeRelease {
    async fn mount(server: &mut Server, initial: &str) -> Self {
        let description = Arc::new(Mutex::new(initial.to_string()));
        let writes = Arc::new(Mutex::new(Vec::new()));

        let current = description.clone();
        server
            .mock("GET", RELEASE)
            .with_status(200)
            .with_body_from_request(move |_| release_json(&current.lock().unwrap()))
            .create_async()
            .await;

        let current = description.clone();
        let history = writes.clone();
        server
            .mock("PUT", RELEASE)
            .match_header("PRIVATE-TOKEN", "gl-token")
            .with_status(200)
            .with_body_from_request(move |request| {
                let sent: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
                let text = sent["description"].as_str().unwrap().to_string();
                *current.lock().unwrap() = text.clone();
                history.lock().unwrap().push(text.clone());
                release_json(&text)
            })
            .create_async()
            .await;

        FakeRelease {
            description,
            writes,
        }
    }
}

async fn mount_upload(server: &mut Server, name: &str, url: &str) -> mockito::Mock {
    server
        .mock("POST", "/projects/group%2Fproject/uploads")
        .match_body(Matcher::Regex(format!(r#"filename="{}""#, regex_escape(name))))
        .with_status(201)
        .with_body(json!({ "alt": name, "url": url }).to_string())
        .create_async()
        .await
}

fn regex_escape(text: &str) -> String {
    text.replace('.', r"\.")
}

fn bullet_names(description: &str) -> Vec<String> {
    ReleaseBody::parse(description)
        .assets
        .into_iter()
        .map(|link| link.name)
        .collect()
}

#[tokio::test]
async fn existing_gitlab_release_is_synced_through_the_engine() {
    let mut server = Server::new_async().await;
    let release = FakeRelease::mount(
        &mut server,
        "Notes\n\
         GitLab CI build log: https://gitlab.com/group/project/builds/6\n\
         Downloads:\n \
         * [a.txt](/uploads/old/a.txt)\n",
    )
    .await;
    let upload_a = mount_upload(&mut server, "a.txt", "/uploads/new1/a.txt").await;
    let upload_b = mount_upload(&mut server, "b.txt", "/uploads/new2/b.txt").await;

    let dir = tempfile::tempdir().unwrap();
    let files: Vec<PathBuf> = ["a.txt", "b.txt"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, name).unwrap();
            path
        })
        .collect();

    let client = GitLabClient::new(
        "gl-token".into(),
        "group".into(),
        "project".into(),
        &server.url(),
    )
    .unwrap();
    let uploader = ReleaseUploader::new(
        Arc::new(client),
        UploadOptions {
            release_body: String::new(),
            prep_only: false,
        },
    );

    let report = uploader.run(&gitlab_event(), &files).await.unwrap();

    assert!(!report.created);
    assert!(!report.recreated);
    assert_eq!(report.uploaded.len(), 2);
    upload_a.assert_async().await;
    upload_b.assert_async().await;

    let final_description = release.description.lock().unwrap().clone();
    assert_eq!(
        final_description,
        "Notes\n\
         GitLab CI build log: https://gitlab.com/group/project/builds/7\n\
         Downloads:\n \
         * [a.txt](/uploads/new1/a.txt)\n \
         * [b.txt](/uploads/new2/b.txt)\n"
    );

    let lines: Vec<&str> = final_description.lines().collect();
    let header = lines.iter().position(|l| *l == DOWNLOADS_HEADER).unwrap();
    assert!(lines[header + 1..].iter().all(|l| l.starts_with(" * [")));

    for written in release.writes.lock().unwrap().iter() {
        let mut names = bullet_names(written);
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count, "duplicate bullet in {:?}", written);
        assert_eq!(
            written
                .lines()
                .filter(|l| l.starts_with("GitLab CI build log:"))
                .count(),
            1
        );
    }
}
