use chrono::Utc;
use cinder_lib::game::metadata::{LatestVersions, PartialVersion, VersionCatalog, VersionType};
use cinder_lib::game::version::{CatalogProvider, VersionError, VersionResolver};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn root_json() -> String {
    serde_json::json!({
        "id": "1.20.1",
        "arguments": {
            "game": ["--username", "${auth_player_name}"],
            "jvm": ["-Dlog4j2.formatMsgNoLookups=true"]
        },
        "assetIndex": {
            "id": "5",
            "sha1": "abc",
            "size": 1,
            "totalSize": 2,
            "url": "https://example.invalid/5.json"
        },
        "assets": "5",
        "downloads": {
            "client": {"url": "https://example.invalid/client.jar", "sha1": "def", "size": 10}
        },
        "libraries": [
            {"name": "com.example:parent-lib:1.0"}
        ],
        "mainClass": "net.minecraft.client.main.Main",
        "minimumLauncherVersion": 21,
        "complianceLevel": 1,
        "releaseTime": "2023-06-12T13:25:51+00:00",
        "time": "2023-06-12T13:25:51+00:00",
        "type": "release"
    })
    .to_string()
}

fn child_json() -> String {
    serde_json::json!({
        "id": "fabric-x",
        "inheritsFrom": "1.20.1",
        "arguments": {
            "game": ["--extra"],
            "jvm": []
        },
        "libraries": [
            {"name": "net.fabricmc:fabric-loader:0.15.0"}
        ],
        "releaseTime": "2023-07-01T00:00:00+00:00",
        "time": "2023-07-01T00:00:00+00:00"
    })
    .to_string()
}

fn catalog_entry(id: &str, url: String, sha1: String) -> PartialVersion {
    PartialVersion {
        id: id.to_string(),
        version_type: VersionType::Release,
        url,
        time: Utc::now(),
        release_time: Utc::now(),
        sha1,
        compliance_level: 1,
    }
}

fn catalog(entries: Vec<PartialVersion>) -> VersionCatalog {
    VersionCatalog {
        latest: LatestVersions {
            release: "1.20.1".to_string(),
            snapshot: "1.20.1".to_string(),
        },
        versions: entries,
    }
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolves_child_over_catalog_with_verification() {
    init_logs();
    let server = MockServer::start().await;
    let root = root_json();
    let child = child_json();
    serve(&server, "/1.20.1.json", root.clone()).await;
    serve(&server, "/fabric-x.json", child.clone()).await;

    let catalog = catalog(vec![
        catalog_entry(
            "1.20.1",
            format!("{}/1.20.1.json", server.uri()),
            sha1_hex(root.as_bytes()),
        ),
        catalog_entry(
            "fabric-x",
            format!("{}/fabric-x.json", server.uri()),
            sha1_hex(child.as_bytes()),
        ),
    ]);

    let provider = CatalogProvider::new(Arc::new(catalog), reqwest::Client::new());
    let resolver = VersionResolver::new(Arc::new(provider));

    let resolved = resolver.resolve("fabric-x").await.unwrap();

    assert_eq!(resolved.id, "fabric-x");
    assert!(resolved.inherits_from.is_none());
    assert_eq!(
        resolved.main_class.as_deref(),
        Some("net.minecraft.client.main.Main")
    );
    assert_eq!(resolved.assets, "5");
    assert_eq!(resolved.version_type, "release");

    let names: Vec<_> = resolved.libraries.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["com.example:parent-lib:1.0", "net.fabricmc:fabric-loader:0.15.0"]
    );
    assert!(resolved.downloads.contains_key("client"));
}

#[tokio::test]
async fn corrupted_document_fails_verification() {
    init_logs();
    let server = MockServer::start().await;
    let root = root_json();
    serve(&server, "/1.20.1.json", root.clone()).await;

    // Catalog declares a hash the served body does not have
    let catalog = catalog(vec![catalog_entry(
        "1.20.1",
        format!("{}/1.20.1.json", server.uri()),
        "0000000000000000000000000000000000000000".to_string(),
    )]);

    let provider = CatalogProvider::new(Arc::new(catalog), reqwest::Client::new());
    let resolver = VersionResolver::new(Arc::new(provider));

    match resolver.resolve("1.20.1").await {
        Err(VersionError::Fetch { id, .. }) => assert_eq!(id, "1.20.1"),
        other => panic!("expected Fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn parent_missing_from_catalog_is_invalid_parent() {
    init_logs();
    let server = MockServer::start().await;
    let child = child_json();
    serve(&server, "/fabric-x.json", child.clone()).await;

    let catalog = catalog(vec![catalog_entry(
        "fabric-x",
        format!("{}/fabric-x.json", server.uri()),
        sha1_hex(child.as_bytes()),
    )]);

    let provider = CatalogProvider::new(Arc::new(catalog), reqwest::Client::new());
    let resolver = VersionResolver::new(Arc::new(provider));

    match resolver.resolve("fabric-x").await {
        Err(VersionError::InvalidParent { id }) => assert_eq!(id, "1.20.1"),
        other => panic!("expected InvalidParent, got {:?}", other),
    }
}
