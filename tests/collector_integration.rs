//! Integration tests for the data collector writing into an in-memory statistics database

use core::time::Duration;
use modstats::api::{CurseForgeClient, ModpackIndexClient, Pacer};
use modstats::collector::DataCollector;
use modstats::deps::{BoundedFetcher, DependencyResolver, DependencyStore, ResolverOptions};
use modstats::storage::{DependentProject, DownloadComposition, NullSaveHandler, SaveHandler, SqliteSaveHandler};
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const TIMEOUT: Duration = Duration::from_secs(5);
const COLLECTED_AT: i64 = 1_700_000_000;

const TARGET_ID: u64 = 100;
const DEPENDENT_ID: u64 = 200;

fn project_json(id: u64, name: &str, download_count: u64) -> Value {
    json!({
        "id": id,
        "slug": format!("project-{id}"),
        "name": name,
        "summary": "",
        "authors": [{"id": id + 1, "name": format!("author-{id}")}],
        "dateCreated": "2023-01-01T00:00:00Z",
        "dateModified": "2024-01-01T00:00:00Z",
        "downloadCount": download_count
    })
}

fn file_json(project_id: u64, file_id: u64, download_count: u64, download_url: Option<String>) -> Value {
    json!({
        "modId": project_id,
        "id": file_id,
        "displayName": format!("File {file_id}"),
        "fileName": format!("file-{file_id}.zip"),
        "releaseType": 1,
        "gameVersions": ["1.20.1"],
        "fileDate": "2024-01-01T00:00:00Z",
        "fileLength": 2_048,
        "downloadCount": download_count,
        "downloadUrl": download_url
    })
}

fn modpack_archive(manifest: &Value) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("manifest.json", SimpleFileOptions::default())
        .expect("Failed to start manifest entry");
    writer
        .write_all(manifest.to_string().as_bytes())
        .expect("Failed to write manifest");
    writer.finish().expect("Failed to finish archive").into_inner()
}

/// One target project with one file, bundled by one modpack file
struct World {
    server: MockServer,
    scratch: TempDir,
}

impl World {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let download_url = format!("{}/cdn/pack-5.zip", server.uri());

        let routes = [
            ("GET", "/v1/mods/100", json!({"data": project_json(TARGET_ID, "Target Mod", 10_000)})),
            (
                "GET",
                "/v1/mods/100/files",
                json!({"data": [file_json(TARGET_ID, 42, 9_000, Some("https://edge.example.com/mod.jar".into()))]}),
            ),
            ("GET", "/index/v1/mods", json!({"data": [{"id": 9000, "curse_info": {"curse_id": TARGET_ID}}]})),
            ("GET", "/index/v1/mod/9000/modpacks", json!({"data": [{"id": 9001, "curse_info": {"curse_id": DEPENDENT_ID}}]})),
            (
                "GET",
                "/v1/mods/200/files",
                json!({"data": [file_json(DEPENDENT_ID, 5, 40, Some(download_url.clone()))]}),
            ),
        ];

        for (verb, route, body) in routes {
            Mock::given(method(verb))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        Mock::given(method("POST"))
            .and(path("/v1/mods"))
            .and(body_json(json!({"modIds": [DEPENDENT_ID]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [project_json(DEPENDENT_ID, "All the Mods", 5_000)]})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/mods/files"))
            .and(body_json(json!({"fileIds": [5]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [file_json(DEPENDENT_ID, 5, 40, Some(download_url))]})))
            .mount(&server)
            .await;

        Mock::given(path("/cdn/pack-5.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(modpack_archive(&json!({
                "files": [{"projectID": TARGET_ID, "fileID": 42}, {"projectID": 7, "fileID": 3}]
            }))))
            .mount(&server)
            .await;

        Self {
            server,
            scratch: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn collector(&self) -> DataCollector {
        let pacer = Pacer::unpaced();
        let curseforge = CurseForgeClient::new("test-key", self.server.uri(), TIMEOUT, Arc::clone(&pacer)).expect("Failed to create client");
        let index = ModpackIndexClient::new(format!("{}/index", self.server.uri()), TIMEOUT, Arc::clone(&pacer))
            .expect("Failed to create index client");
        let fetcher = BoundedFetcher::new(TIMEOUT, pacer).expect("Failed to create fetcher");

        DataCollector::new(DependencyResolver::new(
            curseforge,
            index,
            fetcher,
            DependencyStore::open_in_memory().expect("Failed to open store"),
            ResolverOptions {
                scratch_dir: self.scratch.path().to_path_buf(),
                max_file_length: 40_000_000,
                skip_zero_downloads: true,
            },
        ))
    }
}

#[tokio::test]
async fn test_collect_stores_project_and_dependents() {
    let world = World::start().await;
    let collector = world.collector();
    let mut stats = SqliteSaveHandler::open_in_memory(COLLECTED_AT).expect("Failed to open statistics database");

    stats.begin().expect("begin");
    let collected = collector.collect_data(&mut stats, TARGET_ID, false).await.expect("Collection should succeed");
    stats.commit().expect("commit");

    assert!(collected);
    assert_eq!(
        stats.project_dependents(TARGET_ID).expect("dependents"),
        vec![DependentProject {
            project_id: DEPENDENT_ID,
            name: "All the Mods".into(),
        }]
    );
    assert_eq!(
        stats.download_composition(TARGET_ID).expect("composition"),
        vec![DownloadComposition {
            timestamp: COLLECTED_AT,
            total: 10_000,
            via_dependents: 40,
            direct: 9_960,
        }]
    );

    // The manifest's other dependency is not tracked, so nothing depends on it
    assert!(stats.project_dependents(7).expect("dependents").is_empty());
}

#[tokio::test]
async fn test_unchanged_project_is_not_collected_twice() {
    let world = World::start().await;
    let collector = world.collector();
    let mut stats = SqliteSaveHandler::open_in_memory(COLLECTED_AT).expect("Failed to open statistics database");

    assert!(collector.collect_data(&mut stats, TARGET_ID, false).await.expect("first collection"));
    assert!(!collector.collect_data(&mut stats, TARGET_ID, false).await.expect("second collection"));
    assert!(collector.collect_data(&mut stats, TARGET_ID, true).await.expect("forced collection"));
}

#[tokio::test]
async fn test_unknown_project_collects_nothing() {
    let world = World::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/mods/555"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&world.server)
        .await;

    let collector = world.collector();
    let mut stats = SqliteSaveHandler::open_in_memory(COLLECTED_AT).expect("Failed to open statistics database");

    assert!(!collector.collect_data(&mut stats, 555, false).await.expect("Collection should not error"));
    assert!(stats.project_dependents(555).expect("dependents").is_empty());
}

#[tokio::test]
async fn test_rolled_back_collection_leaves_no_trace() {
    let world = World::start().await;
    let collector = world.collector();
    let mut stats = SqliteSaveHandler::open_in_memory(COLLECTED_AT).expect("Failed to open statistics database");

    stats.begin().expect("begin");
    assert!(collector.collect_data(&mut stats, TARGET_ID, false).await.expect("collection"));
    stats.rollback().expect("rollback");

    assert!(stats.project_dependents(TARGET_ID).expect("dependents").is_empty());
    assert!(stats.download_composition(TARGET_ID).expect("composition").is_empty());
}

#[tokio::test]
async fn test_dry_run_still_resolves_dependencies() {
    let world = World::start().await;
    let collector = world.collector();
    let mut handler = NullSaveHandler;

    assert!(collector.collect_data(&mut handler, TARGET_ID, false).await.expect("collection"));
    assert!(
        collector
            .resolver()
            .is_dependency_of(modstats::deps::FileIdentifier::new(DEPENDENT_ID, 5), TARGET_ID)
            .expect("lookup")
    );
}
