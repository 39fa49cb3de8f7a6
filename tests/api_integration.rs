//! Integration tests for the marketplace and modpack index clients using wiremock

use core::time::Duration;
use modstats::api::{CurseForgeClient, ModpackIndexClient, Pacer, ReleaseType};
use modstats::deps::FileIdentifier;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn curseforge(server: &MockServer) -> CurseForgeClient {
    CurseForgeClient::new("test-key", server.uri(), TIMEOUT, Pacer::unpaced()).expect("Failed to create client")
}

#[tokio::test]
async fn test_get_project_parses_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods/238222"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 238_222,
                "gameId": 432,
                "slug": "jei",
                "name": "Just Enough Items (JEI)",
                "summary": "View items and recipes",
                "authors": [{"id": 1, "name": "mezz", "url": "https://example.com/mezz"}],
                "logo": {"id": 5, "thumbnailUrl": "https://media.example.com/jei.png"},
                "latestFilesIndexes": [{"gameVersion": "1.20.1", "fileId": 1}, {"gameVersion": "1.19.2", "fileId": 2}],
                "dateCreated": "2015-11-23T15:20:00.123Z",
                "dateModified": "2024-03-01T10:00:00Z",
                "downloadCount": 312_456_789.0,
                "links": {"websiteUrl": "https://www.curseforge.com/minecraft/mc-mods/jei"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let project = curseforge(&server).get_project(238_222).await.expect("Project lookup should succeed");

    assert_eq!(project.id, 238_222);
    assert_eq!(project.slug, "jei");
    assert_eq!(project.download_count, 312_456_789);
    assert_eq!(project.authors.len(), 1);
    assert_eq!(project.authors[0].name, "mezz");
    assert_eq!(project.project_type().as_deref(), Some("mc-mods"));
    assert_eq!(project.logo_url(), Some("https://media.example.com/jei.png"));
    assert_eq!(project.game_versions(), vec!["1.20.1", "1.19.2"]);
    assert_eq!(project.date_created.timestamp_millis(), 1_448_292_000_123);
}

#[tokio::test]
async fn test_get_project_rejects_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = curseforge(&server).get_project(1).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_get_files_posts_ids_and_parses_records() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/mods/files"))
        .and(body_json(json!({"fileIds": [5, 6]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "modId": 200, "id": 5, "displayName": "Pack 1.0", "fileName": "pack-1.0.zip",
                    "releaseType": 1, "gameVersions": ["1.20.1", "Forge"], "fileDate": "2024-01-01T00:00:00Z",
                    "fileLength": 2048, "downloadCount": 40, "downloadUrl": "https://edge.example.com/pack-1.0.zip"
                },
                {
                    "modId": 200, "id": 6, "displayName": "Pack 1.1-beta", "fileName": "pack-1.1.zip",
                    "releaseType": 7, "fileDate": "2024-02-01T00:00:00Z",
                    "fileLength": 4096, "downloadCount": 0, "downloadUrl": null
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let files = curseforge(&server).get_files(&[5, 6]).await.expect("File lookup should succeed");

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].identifier(), FileIdentifier::new(200, 5));
    assert_eq!(files[0].release_type, ReleaseType::Release);
    assert_eq!(files[0].download_url.as_deref(), Some("https://edge.example.com/pack-1.0.zip"));
    assert_eq!(files[1].release_type, ReleaseType::Unknown);
    assert!(files[1].game_versions.is_empty());
    assert!(files[1].download_url.is_none());
}

#[tokio::test]
async fn test_empty_batches_skip_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = curseforge(&server);
    assert!(client.get_projects(&[]).await.expect("empty batch").is_empty());
    assert!(client.get_files(&[]).await.expect("empty batch").is_empty());
}

#[tokio::test]
async fn test_discover_dependents_maps_name_to_index_entry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods"))
        .and(query_param("name", "Mouse Tweaks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 11, "name": "Mouse Tweaks Unofficial", "curse_info": {"curse_id": 9}},
                {"id": 12, "name": "Mouse Tweaks", "curse_info": {"curse_id": 60089}}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/mod/12/modpacks"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 301, "curse_info": {"curse_id": 400}},
                {"id": 302, "curse_info": {"curse_id": 401}}
            ]
        })))
        .mount(&server)
        .await;

    let client = ModpackIndexClient::new(server.uri(), TIMEOUT, Pacer::unpaced()).expect("Failed to create client");
    let dependents = client.discover_dependents(60089, "Mouse Tweaks").await;

    assert_eq!(dependents, vec![400, 401]);
}

#[tokio::test]
async fn test_discover_dependents_tolerates_entries_without_curse_info() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 10, "curse_info": null},
                {"id": 12, "curse_info": {"curse_id": 60089}}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/mod/12/modpacks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 301, "curse_info": {"curse_id": 400}},
                {"id": 302, "curse_info": null},
                {"id": 303},
                {"id": 304, "curse_info": {"curse_id": 402}}
            ]
        })))
        .mount(&server)
        .await;

    let client = ModpackIndexClient::new(server.uri(), TIMEOUT, Pacer::unpaced()).expect("Failed to create client");
    assert_eq!(client.discover_dependents(60089, "Mouse Tweaks").await, vec![400, 402]);
}

#[tokio::test]
async fn test_discover_dependents_below_base_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/mods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 12, "curse_info": {"curse_id": 60089}}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/mod/12/modpacks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 301, "curse_info": {"curse_id": 400}}]
        })))
        .mount(&server)
        .await;

    let client = ModpackIndexClient::new(format!("{}/api", server.uri()), TIMEOUT, Pacer::unpaced()).expect("Failed to create client");
    assert_eq!(client.discover_dependents(60089, "Mouse Tweaks").await, vec![400]);
}

#[tokio::test]
async fn test_discover_dependents_of_unlisted_project_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 11, "curse_info": {"curse_id": 9}}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/mod/11/modpacks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = ModpackIndexClient::new(server.uri(), TIMEOUT, Pacer::unpaced()).expect("Failed to create client");
    assert!(client.discover_dependents(60089, "Mouse Tweaks").await.is_empty());
}

#[tokio::test]
async fn test_shared_pacer_spaces_requests_across_clients() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let pacer = Pacer::new(Duration::from_millis(100));
    let curseforge = CurseForgeClient::new("test-key", server.uri(), TIMEOUT, Arc::clone(&pacer)).expect("Failed to create client");
    let index = ModpackIndexClient::new(server.uri(), TIMEOUT, pacer).expect("Failed to create client");

    let start = std::time::Instant::now();
    let _ = curseforge.get_project_files(1).await.expect("listing");
    let _ = index.discover_dependents(1, "x").await;
    let _ = curseforge.get_project_files(2).await.expect("listing");

    // Three requests through one pacer need at least two full intervals
    assert!(start.elapsed() >= Duration::from_millis(200));
}
