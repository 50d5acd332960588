use mockito::{Matcher, Server};
use serde_json::json;

use release_uploader::forge::ForgeClient;
use release_uploader::gitlab::GitLabClient;
use release_uploader::release::{Release, ReleaseAsset};

const RELEASES: &str = "/projects/group%2Fproject/releases";

fn client(server: &Server) -> GitLabClient {
    GitLabClient::new("gl-token".into(), "group".into(), "project".into(), &server.url()).unwrap()
}

fn release_json(tag: &str, description: &str, commit: &str) -> String {
    json!({
        "tag_name": tag,
        "name": "Continuous build",
        "description": description,
        "commit": { "id": commit },
    })
    .to_string()
}

#[tokio::test]
async fn missing_release_is_none() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", format!("{}/continuous", RELEASES).as_str())
        .match_header("PRIVATE-TOKEN", "gl-token")
        .with_status(404)
        .with_body(r#"{"message":"404 Not Found"}"#)
        .create_async()
        .await;

    let found = client(&server).get_release_by_tag("continuous").await.unwrap();

    assert!(found.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn existing_release_carries_commit() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{}/continuous", RELEASES).as_str())
        .with_status(200)
        .with_body(release_json("continuous", "Notes\n", "abc123"))
        .create_async()
        .await;

    let release = client(&server)
        .get_release_by_tag("continuous")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(release.tag_name(), "continuous");
    assert_eq!(release.target_commitish, "abc123");
    assert_eq!(release.body, "Notes\n");
    assert_eq!(release.id, None);
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{}/continuous", RELEASES).as_str())
        .with_status(500)
        .create_async()
        .await;

    let err = client(&server)
        .get_release_by_tag("continuous")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn create_release_targets_commit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", RELEASES)
        .match_body(Matcher::PartialJson(json!({
            "tag_name": "continuous",
            "name": "Continuous build",
            "ref": "abc123",
        })))
        .with_status(201)
        .with_body(release_json("continuous", "", "abc123"))
        .create_async()
        .await;

    let mut release = Release::new("continuous");
    release.name = "Continuous build".into();
    release.target_commitish = "abc123".into();
    release.prerelease = true;

    let created = client(&server).create_release(&release).await.unwrap();

    assert_eq!(created.target_commitish, "abc123");
    assert!(created.prerelease);
    mock.assert_async().await;
}

#[tokio::test]
async fn upload_links_file_from_description() {
    let mut server = Server::new_async().await;
    let upload = server
        .mock("POST", "/projects/group%2Fproject/uploads")
        .match_header("PRIVATE-TOKEN", "gl-token")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .with_status(201)
        .with_body(
            json!({
                "alt": "tool.zip",
                "url": "/uploads/abc/tool.zip",
                "markdown": "[tool.zip](/uploads/abc/tool.zip)",
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", format!("{}/continuous", RELEASES).as_str())
        .with_status(200)
        .with_body(release_json("continuous", "Notes\n", "abc123"))
        .create_async()
        .await;
    let rewrite = server
        .mock("PUT", format!("{}/continuous", RELEASES).as_str())
        .match_body(Matcher::PartialJson(json!({
            "description": "Notes\nDownloads:\n * [tool.zip](/uploads/abc/tool.zip)\n",
        })))
        .with_status(200)
        .with_body(release_json(
            "continuous",
            "Notes\nDownloads:\n * [tool.zip](/uploads/abc/tool.zip)\n",
            "abc123",
        ))
        .create_async()
        .await;

    let release = Release::new("continuous");
    let asset = client(&server)
        .upload_release_asset(&release, "tool.zip", b"zip".to_vec())
        .await
        .unwrap();

    assert_eq!(asset.name, "tool.zip");
    assert_eq!(asset.url.as_deref(), Some("/uploads/abc/tool.zip"));
    upload.assert_async().await;
    rewrite.assert_async().await;
}

#[tokio::test]
async fn assets_come_from_description() {
    let server = Server::new_async().await;
    let mut release = Release::new("continuous");
    release.body = "Notes\nDownloads:\n * [a.zip](/uploads/1/a.zip)\n * [b.zip](/uploads/2/b.zip)\n".into();

    let assets = client(&server).get_assets(&release).await.unwrap();

    let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a.zip", "b.zip"]);
    assert_eq!(assets[1].url.as_deref(), Some("/uploads/2/b.zip"));
}

#[tokio::test]
async fn deleting_asset_drops_its_link() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("{}/continuous", RELEASES).as_str())
        .with_status(200)
        .with_body(release_json(
            "continuous",
            "Notes\nDownloads:\n * [a.zip](/uploads/1/a.zip)\n * [b.zip](/uploads/2/b.zip)\n",
            "abc123",
        ))
        .create_async()
        .await;
    let rewrite = server
        .mock("PUT", format!("{}/continuous", RELEASES).as_str())
        .match_body(Matcher::PartialJson(json!({
            "description": "Notes\nDownloads:\n * [b.zip](/uploads/2/b.zip)\n",
        })))
        .with_status(200)
        .with_body(release_json("continuous", "", "abc123"))
        .create_async()
        .await;

    client(&server)
        .delete_release_asset(&ReleaseAsset::new("continuous", "a.zip"))
        .await
        .unwrap();

    rewrite.assert_async().await;
}

#[tokio::test]
async fn deleted_tag_is_recreated_with_its_message() {
    let mut server = Server::new_async().await;
    let tag_path = "/projects/group%2Fproject/repository/tags/continuous";
    server
        .mock("GET", tag_path)
        .with_status(200)
        .with_body(json!({ "name": "continuous", "message": "Nightly" }).to_string())
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", tag_path)
        .with_status(204)
        .create_async()
        .await;
    let recreate = server
        .mock("POST", "/projects/group%2Fproject/repository/tags")
        .match_body(Matcher::PartialJson(json!({
            "tag_name": "continuous",
            "ref": "def456",
            "message": "Nightly",
        })))
        .with_status(201)
        .with_body(json!({ "name": "continuous", "message": "Nightly" }).to_string())
        .create_async()
        .await;
    let create = server
        .mock("POST", RELEASES)
        .match_body(Matcher::PartialJson(json!({ "tag_name": "continuous" })))
        .with_status(201)
        .with_body(release_json("continuous", "", "def456"))
        .create_async()
        .await;

    let gitlab = client(&server);
    gitlab.delete_tag("continuous").await.unwrap();

    let mut release = Release::new("continuous");
    release.name = "Continuous build".into();
    release.target_commitish = "def456".into();
    let created = gitlab.create_release(&release).await.unwrap();

    assert_eq!(created.target_commitish, "def456");
    delete.assert_async().await;
    recreate.assert_async().await;
    create.assert_async().await;
}
