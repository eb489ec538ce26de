/// Inheritance-chain resolution: flattens a version document with its
/// ancestors into one self-contained, launch-ready document.
use crate::game::metadata::VersionCatalog;
use crate::game::version::document::VersionDocument;
use futures::future::BoxFuture;
use futures::FutureExt;
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::sync::Arc;

/// Errors produced while resolving a version chain
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// A root document fails the root invariant
    #[error("invalid version data for {id}")]
    InvalidVersionData { id: String },

    /// A referenced parent id is absent from the version catalog
    #[error("invalid parent: {id} not found in version catalog")]
    InvalidParent { id: String },

    /// The inheritsFrom chain loops back on itself
    #[error("inheritance cycle detected at {id}")]
    InheritanceCycle { id: String },

    /// Transport or parse failure while fetching a chain link
    #[error("failed to fetch version document {id}")]
    Fetch {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Supplies the raw (unflattened) document for a version id.
/// Injected so tests can return canned chains without any transport.
pub trait DocumentProvider: Send + Sync {
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<VersionDocument, VersionError>>;
}

/// Resolves a version id into a flattened [`VersionDocument`]
pub struct VersionResolver {
    provider: Arc<dyn DocumentProvider>,
}

impl VersionResolver {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self { provider }
    }

    /// Fetch the document for `id` and flatten its inheritance chain.
    /// One fetch per chain link; no caching beyond this call.
    pub async fn resolve(&self, id: &str) -> Result<VersionDocument, VersionError> {
        let doc = self.provider.fetch(id).await?;
        let mut visited = HashSet::new();
        visited.insert(doc.id.clone());
        self.flatten(doc, &mut visited).await
    }

    /// Flatten an already-fetched document against its ancestors
    pub async fn flatten(
        &self,
        doc: VersionDocument,
        visited: &mut HashSet<String>,
    ) -> Result<VersionDocument, VersionError> {
        let parent_id = match doc.inherits_from.clone() {
            None => {
                if !doc.validate() {
                    return Err(VersionError::InvalidVersionData { id: doc.id });
                }
                return Ok(doc);
            }
            Some(pid) => pid,
        };

        if !visited.insert(parent_id.clone()) {
            return Err(VersionError::InheritanceCycle { id: parent_id });
        }

        let parent_raw = self.provider.fetch(&parent_id).await?;
        // The parent's own chain is flattened first
        let parent = Box::pin(self.flatten(parent_raw, visited)).await?;

        Ok(merge(parent, doc))
    }
}

/// Merge a child document over its fully-flattened parent.
/// Sequences append parent-first; scalars follow per-field override rules.
pub(crate) fn merge(parent: VersionDocument, child: VersionDocument) -> VersionDocument {
    let arguments = match (parent.arguments, child.arguments) {
        (Some(mut p), Some(c)) => {
            p.game.extend(c.game);
            p.jvm.extend(c.jvm);
            Some(p)
        }
        (p, c) => c.or(p),
    };

    let mut downloads = parent.downloads;
    downloads.extend(child.downloads);

    let mut libraries = parent.libraries;
    libraries.extend(child.libraries);

    VersionDocument {
        id: child.id,
        inherits_from: None,
        arguments,
        minecraft_arguments: None,
        asset_index: child.asset_index.or(parent.asset_index),
        // The asset-group label is always inherited from the parent
        assets: parent.assets,
        downloads,
        libraries,
        logging: child.logging.or(parent.logging),
        main_class: child.main_class.or(parent.main_class),
        minimum_launcher_version: child.minimum_launcher_version,
        compliance_level: child.compliance_level,
        release_time: child.release_time,
        time: child.time,
        version_type: if child.version_type.is_empty() {
            parent.version_type
        } else {
            child.version_type
        },
    }
}

/// [`DocumentProvider`] backed by the remote version catalog: looks the id up
/// in the catalog, fetches the document at the catalog URL and verifies it
/// against the catalog's declared SHA-1 before parsing.
pub struct CatalogProvider {
    catalog: Arc<VersionCatalog>,
    client: reqwest::Client,
}

impl CatalogProvider {
    pub fn new(catalog: Arc<VersionCatalog>, client: reqwest::Client) -> Self {
        Self { catalog, client }
    }

    async fn fetch_verified(&self, id: &str) -> Result<VersionDocument, VersionError> {
        let entry = self
            .catalog
            .find(id)
            .ok_or_else(|| VersionError::InvalidParent { id: id.to_string() })?;

        let fetch_err = |source: anyhow::Error| VersionError::Fetch {
            id: id.to_string(),
            source,
        };

        let response = self
            .client
            .get(&entry.url)
            .send()
            .await
            .map_err(|e| fetch_err(e.into()))?;

        if !response.status().is_success() {
            return Err(fetch_err(anyhow::anyhow!(
                "HTTP {} from {}",
                response.status(),
                entry.url
            )));
        }

        let bytes = response.bytes().await.map_err(|e| fetch_err(e.into()))?;

        // Every chain link is verified, not just the top-level document
        if !entry.sha1.is_empty() {
            let mut hasher = Sha1::new();
            hasher.update(&bytes);
            let computed = format!("{:x}", hasher.finalize());
            if !computed.eq_ignore_ascii_case(&entry.sha1) {
                return Err(fetch_err(anyhow::anyhow!(
                    "SHA1 mismatch for {}: expected {}, got {}",
                    entry.url,
                    entry.sha1,
                    computed
                )));
            }
        }

        VersionDocument::from_json(&bytes).map_err(fetch_err)
    }
}

impl DocumentProvider for CatalogProvider {
    fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<VersionDocument, VersionError>> {
        async move {
            log::debug!("Fetching version document for {}", id);
            self.fetch_verified(id).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::version::document::{
        ArgumentToken, Arguments, AssetIndexRef, DownloadEntry, Library,
    };
    use std::collections::HashMap;

    struct CannedProvider {
        documents: HashMap<String, VersionDocument>,
    }

    impl CannedProvider {
        fn new(documents: Vec<VersionDocument>) -> Self {
            Self {
                documents: documents.into_iter().map(|d| (d.id.clone(), d)).collect(),
            }
        }
    }

    impl DocumentProvider for CannedProvider {
        fn fetch<'a>(
            &'a self,
            id: &'a str,
        ) -> BoxFuture<'a, Result<VersionDocument, VersionError>> {
            async move {
                self.documents
                    .get(id)
                    .cloned()
                    .ok_or_else(|| VersionError::InvalidParent { id: id.to_string() })
            }
            .boxed()
        }
    }

    fn library(name: &str) -> Library {
        Library {
            name: name.to_string(),
            downloads: None,
            url: None,
            rules: None,
            natives: None,
            extract: None,
        }
    }

    fn root_document(id: &str) -> VersionDocument {
        let mut downloads = HashMap::new();
        downloads.insert(
            "client".to_string(),
            DownloadEntry {
                url: format!("https://example.invalid/{}/client.jar", id),
                sha1: "abc".to_string(),
                size: 10,
            },
        );

        VersionDocument {
            id: id.to_string(),
            inherits_from: None,
            arguments: Some(Arguments {
                game: vec![ArgumentToken::Plain("--gameDir".to_string())],
                jvm: vec![ArgumentToken::Plain("-Xmx2G".to_string())],
            }),
            minecraft_arguments: None,
            asset_index: Some(AssetIndexRef {
                id: "5".to_string(),
                sha1: "abc".to_string(),
                size: 1,
                total_size: 2,
                url: "https://example.invalid/5.json".to_string(),
            }),
            assets: "5".to_string(),
            downloads,
            libraries: vec![library("com.example:parent-lib:1.0")],
            logging: None,
            main_class: Some("net.minecraft.client.main.Main".to_string()),
            minimum_launcher_version: 21,
            compliance_level: 1,
            release_time: "2023-06-12T13:25:51+00:00".to_string(),
            time: "2023-06-12T13:25:51+00:00".to_string(),
            version_type: "release".to_string(),
        }
    }

    fn child_document(id: &str, parent: &str) -> VersionDocument {
        VersionDocument {
            id: id.to_string(),
            inherits_from: Some(parent.to_string()),
            arguments: Some(Arguments {
                game: vec![ArgumentToken::Plain("--fml.forgeVersion".to_string())],
                jvm: vec![],
            }),
            minecraft_arguments: None,
            asset_index: None,
            assets: "3".to_string(),
            downloads: HashMap::new(),
            libraries: vec![
                library("com.example:child-a:1.0"),
                library("com.example:child-b:1.0"),
            ],
            logging: None,
            main_class: None,
            minimum_launcher_version: 0,
            compliance_level: 3,
            release_time: "2023-07-01T00:00:00+00:00".to_string(),
            time: "2023-07-01T00:00:00+00:00".to_string(),
            version_type: String::new(),
        }
    }

    #[tokio::test]
    async fn resolve_root_passes_through_unchanged() {
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![root_document(
            "1.20.1",
        )])));

        let resolved = resolver.resolve("1.20.1").await.unwrap();
        assert_eq!(resolved, root_document("1.20.1"));
    }

    #[tokio::test]
    async fn invalid_root_fails_with_invalid_version_data() {
        let mut root = root_document("1.20.1");
        root.version_type = String::new();
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![root])));

        match resolver.resolve("1.20.1").await {
            Err(VersionError::InvalidVersionData { id }) => assert_eq!(id, "1.20.1"),
            other => panic!("expected InvalidVersionData, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_parent_fails_with_invalid_parent() {
        let child = child_document("loader-x", "missing-id");
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![child])));

        match resolver.resolve("loader-x").await {
            Err(VersionError::InvalidParent { id }) => assert_eq!(id, "missing-id"),
            other => panic!("expected InvalidParent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn libraries_append_parent_first() {
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![
            root_document("1.20.1"),
            child_document("loader-x", "1.20.1"),
        ])));

        let resolved = resolver.resolve("loader-x").await.unwrap();
        let names: Vec<_> = resolved.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "com.example:parent-lib:1.0",
                "com.example:child-a:1.0",
                "com.example:child-b:1.0"
            ]
        );
    }

    #[tokio::test]
    async fn sentinel_main_class_falls_back_to_parent() {
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![
            root_document("1.20.1"),
            child_document("loader-x", "1.20.1"),
        ])));

        let resolved = resolver.resolve("loader-x").await.unwrap();
        assert_eq!(
            resolved.main_class.as_deref(),
            Some("net.minecraft.client.main.Main")
        );
    }

    #[tokio::test]
    async fn scalar_fields_and_labels_follow_override_rules() {
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![
            root_document("1.20.1"),
            child_document("loader-x", "1.20.1"),
        ])));

        let resolved = resolver.resolve("loader-x").await.unwrap();

        // Always the child's own values
        assert_eq!(resolved.id, "loader-x");
        assert_eq!(resolved.minimum_launcher_version, 0);
        assert_eq!(resolved.compliance_level, 3);
        assert_eq!(resolved.release_time, "2023-07-01T00:00:00+00:00");

        // Empty child type falls back to the parent's
        assert_eq!(resolved.version_type, "release");

        // Asset-group label is always the parent's
        assert_eq!(resolved.assets, "5");

        // Unset asset index falls back to the parent's
        assert_eq!(resolved.asset_index.unwrap().id, "5");

        // Flattened result carries no parent reference
        assert!(resolved.inherits_from.is_none());
    }

    #[tokio::test]
    async fn arguments_append_parent_first() {
        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![
            root_document("1.20.1"),
            child_document("loader-x", "1.20.1"),
        ])));

        let resolved = resolver.resolve("loader-x").await.unwrap();
        let args = resolved.arguments.unwrap();
        assert_eq!(
            args.game,
            vec![
                ArgumentToken::Plain("--gameDir".to_string()),
                ArgumentToken::Plain("--fml.forgeVersion".to_string())
            ]
        );
        assert_eq!(args.jvm, vec![ArgumentToken::Plain("-Xmx2G".to_string())]);
    }

    #[tokio::test]
    async fn downloads_union_child_overrides_per_key() {
        let mut child = child_document("loader-x", "1.20.1");
        child.downloads.insert(
            "client".to_string(),
            DownloadEntry {
                url: "https://example.invalid/patched-client.jar".to_string(),
                sha1: "fff".to_string(),
                size: 20,
            },
        );

        let mut root = root_document("1.20.1");
        root.downloads.insert(
            "server".to_string(),
            DownloadEntry {
                url: "https://example.invalid/server.jar".to_string(),
                sha1: "bbb".to_string(),
                size: 30,
            },
        );

        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![root, child])));
        let resolved = resolver.resolve("loader-x").await.unwrap();

        assert_eq!(
            resolved.downloads.get("client").unwrap().url,
            "https://example.invalid/patched-client.jar"
        );
        assert_eq!(
            resolved.downloads.get("server").unwrap().url,
            "https://example.invalid/server.jar"
        );
    }

    #[tokio::test]
    async fn inheritance_cycle_fails_fast() {
        let mut a = child_document("a", "b");
        a.id = "a".to_string();
        let mut b = child_document("b", "a");
        b.id = "b".to_string();

        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![a, b])));

        match resolver.resolve("a").await {
            Err(VersionError::InheritanceCycle { .. }) => {}
            other => panic!("expected InheritanceCycle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn grandparent_chain_flattens_bottom_up() {
        let root = root_document("1.20.1");
        let mut middle = child_document("fabric-base", "1.20.1");
        middle.libraries = vec![library("net.fabricmc:fabric-loader:0.15.0")];
        let mut leaf = child_document("my-pack", "fabric-base");
        leaf.libraries = vec![library("com.example:pack-lib:1.0")];

        let resolver = VersionResolver::new(Arc::new(CannedProvider::new(vec![
            root, middle, leaf,
        ])));

        let resolved = resolver.resolve("my-pack").await.unwrap();
        let names: Vec<_> = resolved.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "com.example:parent-lib:1.0",
                "net.fabricmc:fabric-loader:0.15.0",
                "com.example:pack-lib:1.0"
            ]
        );
        assert_eq!(resolved.id, "my-pack");
    }
}
