/// Launch orchestration: libraries, assets, natives, authentication, spawn.
///
/// Stages run strictly in order; downloads inside a stage run concurrently
/// against a shared [`ProgressTracker`]. Each stage starts only when the
/// previous one completed and nothing requested cancellation.
use crate::game::launcher::classpath::{build_classpath, library_disk_path};
use crate::game::launcher::downloader::download_to_path;
use crate::game::launcher::error::{ErrorSink, LaunchError};
use crate::game::launcher::natives::{
    extract_natives, native_artifact, native_disk_path, resolve_native_classifier,
};
use crate::game::launcher::progress::ProgressTracker;
use crate::game::launcher::registry::ProcessRegistry;
use crate::game::launcher::template::{flatten_tokens, TemplateEngine};
use crate::game::launcher::types::{
    GameInstance, LaunchSpec, OsType, LIBRARIES_BASE_URL, RESOURCES_BASE_URL,
};
use crate::game::version::document::{Arguments, VersionDocument};
use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

const DOWNLOAD_CONCURRENCY: usize = 8;

/// Supplies the access token for the authentication stage. Injected so the
/// pipeline never owns credential refresh logic.
pub trait Authenticator: Send + Sync {
    fn access_token<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Authenticator for accounts whose token is already in hand (offline or
/// pre-refreshed sessions)
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn access_token<'a>(&'a self) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(futures::future::ready(Ok(self.token.clone())))
    }
}

/// Asset index: logical name -> content-addressed object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// Objects are stored under a two-hex-character fan-out directory.
    /// Returns `None` for a hash too short to carry the fan-out prefix.
    pub fn relative_path(&self) -> Option<String> {
        let prefix = self.hash.get(..2)?;
        Some(format!("{}/{}", prefix, self.hash))
    }

    pub fn url(&self) -> Option<String> {
        Some(format!("{}{}", RESOURCES_BASE_URL, self.relative_path()?))
    }
}

/// One planned file fetch
#[derive(Debug, Clone, PartialEq)]
struct DownloadItem {
    url: String,
    path: PathBuf,
    sha1: Option<String>,
}

/// Drives one launch attempt for one instance.
///
/// The trackers are public so frontends can subscribe before calling
/// [`LaunchPipeline::launch`]; cancelling any tracker cancels the attempt at
/// the next stage boundary (and mid-download for in-flight transfers).
pub struct LaunchPipeline {
    spec: LaunchSpec,
    document: VersionDocument,
    client: Client,
    registry: ProcessRegistry,
    authenticator: Arc<dyn Authenticator>,
    os: OsType,

    pub libraries_progress: Arc<ProgressTracker>,
    pub assets_progress: Arc<ProgressTracker>,
    pub natives_progress: Arc<ProgressTracker>,
}

impl LaunchPipeline {
    /// `document` must be flattened; inheritors are resolved before launch
    pub fn new(
        spec: LaunchSpec,
        document: VersionDocument,
        client: Client,
        registry: ProcessRegistry,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            spec,
            document,
            client,
            registry,
            authenticator,
            os: OsType::current(),
            libraries_progress: Arc::new(ProgressTracker::new(0)),
            assets_progress: Arc::new(ProgressTracker::new(0)),
            natives_progress: Arc::new(ProgressTracker::new(0)),
        }
    }

    /// Request cooperative cancellation of the whole attempt
    pub fn cancel(&self) {
        self.libraries_progress.cancel();
        self.assets_progress.cancel();
        self.natives_progress.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.libraries_progress.is_cancelled()
            || self.assets_progress.is_cancelled()
            || self.natives_progress.is_cancelled()
    }

    /// Run every stage and spawn the game. At most one error is surfaced;
    /// follow-up failures from concurrent downloads are logged only.
    pub async fn launch(&self) -> Result<GameInstance, LaunchError> {
        log::info!(
            "Launching instance {} (version {})",
            self.spec.instance_id,
            self.spec.version_id
        );

        if self.registry.is_running(&self.spec.instance_id).await {
            return Err(LaunchError::AlreadyRunning {
                instance_id: self.spec.instance_id.clone(),
            });
        }

        let (sink, mut errors) = ErrorSink::new();

        let result = self.run_stages(&sink).await;

        match result {
            Ok(instance) => Ok(instance),
            Err(e) => {
                sink.report(e);
                // The sink holds whichever error arrived first
                Err(errors.recv().await.unwrap_or(LaunchError::Unknown {
                    source: anyhow::anyhow!("launch failed with no recorded error"),
                }))
            }
        }
    }

    async fn run_stages(&self, sink: &ErrorSink) -> Result<GameInstance, LaunchError> {
        // A cancel requested before the attempt started must stick
        self.gate()?;

        // Stage 1: libraries and the client jar
        let library_items = self.plan_library_downloads()?;
        self.run_downloads(library_items, &self.libraries_progress, sink)
            .await?;
        self.gate()?;

        // Stage 2: asset index and objects
        let asset_index = self.fetch_asset_index().await?;
        let asset_items = self.plan_asset_downloads(&asset_index)?;
        self.run_downloads(asset_items, &self.assets_progress, sink)
            .await?;
        self.gate()?;

        // Stage 3: natives extraction
        let natives_total = self
            .document
            .libraries
            .iter()
            .filter(|l| l.applies_to(self.os))
            .filter(|l| resolve_native_classifier(l, self.os).is_some())
            .count();
        self.natives_progress.begin(natives_total);
        extract_natives(
            &self.document.libraries,
            &self.spec.libraries_dir(),
            &self.spec.natives_dir(),
            self.os,
            &self.natives_progress,
        )
        .await?;
        self.gate()?;

        // Stage 4: authentication
        let access_token = self
            .authenticator
            .access_token()
            .await
            .map_err(|source| LaunchError::AccessTokenFetch { source })?;
        self.gate()?;

        // Stage 5: spawn
        self.spawn_game(&access_token).await
    }

    fn gate(&self) -> Result<(), LaunchError> {
        if self.is_cancelled() {
            Err(LaunchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Everything stage 1 must put on disk: applicable library artifacts,
    /// their natives classifier jars, and the client jar
    fn plan_library_downloads(&self) -> Result<Vec<DownloadItem>, LaunchError> {
        let unknown = |source: anyhow::Error| LaunchError::Unknown { source };
        let libraries_dir = self.spec.libraries_dir();
        let mut items = Vec::new();

        for library in &self.document.libraries {
            if !library.applies_to(self.os) {
                continue;
            }

            let explicit = library.downloads.as_ref().and_then(|d| d.artifact.as_ref());
            match explicit {
                Some(artifact) => {
                    if let Some(ref url) = artifact.url {
                        items.push(DownloadItem {
                            url: url.clone(),
                            path: libraries_dir.join(library_disk_path(library).map_err(unknown)?),
                            sha1: artifact.sha1.clone(),
                        });
                    }
                }
                None => {
                    // Coordinate-only library: URL derived from the Maven
                    // coordinate against the library's repo (or the default)
                    let base = library.url.as_deref().unwrap_or(LIBRARIES_BASE_URL);
                    items.push(DownloadItem {
                        url: library.coordinate_url(base).map_err(unknown)?,
                        path: libraries_dir.join(library_disk_path(library).map_err(unknown)?),
                        sha1: None,
                    });
                }
            }

            if let Some(classifier) = resolve_native_classifier(library, self.os) {
                if let Some(artifact) = native_artifact(library, &classifier) {
                    if let Some(ref url) = artifact.url {
                        items.push(DownloadItem {
                            url: url.clone(),
                            path: libraries_dir.join(
                                native_disk_path(library, &classifier).map_err(unknown)?,
                            ),
                            sha1: artifact.sha1.clone(),
                        });
                    }
                }
            }
        }

        if let Some(client) = self.document.downloads.get("client") {
            items.push(DownloadItem {
                url: client.url.clone(),
                path: self.spec.client_jar(),
                sha1: Some(client.sha1.clone()),
            });
        }

        if let Some(logging) = self
            .document
            .logging
            .as_ref()
            .and_then(|l| l.client.as_ref())
        {
            items.push(DownloadItem {
                url: logging.file.url.clone(),
                path: self
                    .spec
                    .assets_dir()
                    .join("log_configs")
                    .join(&logging.file.id),
                sha1: Some(logging.file.sha1.clone()),
            });
        }

        Ok(items)
    }

    async fn fetch_asset_index(&self) -> Result<AssetIndex, LaunchError> {
        let Some(ref index_ref) = self.document.asset_index else {
            // Flattened documents always carry an index; a missing one means
            // the caller skipped resolution
            return Err(LaunchError::Unknown {
                source: anyhow::anyhow!(
                    "version {} has no asset index; was the document flattened?",
                    self.document.id
                ),
            });
        };

        let index_path = self
            .spec
            .assets_dir()
            .join("indexes")
            .join(format!("{}.json", index_ref.id));
        download_to_path(
            &self.client,
            &index_ref.url,
            &index_path,
            Some(&index_ref.sha1),
            &self.assets_progress,
        )
        .await?;

        let bytes = tokio::fs::read(&index_path)
            .await
            .map_err(|e| LaunchError::Unknown { source: e.into() })?;
        let index: AssetIndex =
            serde_json::from_slice(&bytes).map_err(|source| LaunchError::Downloading {
                url: index_ref.url.clone(),
                source: source.into(),
            })?;
        Ok(index)
    }

    fn plan_asset_downloads(&self, index: &AssetIndex) -> Result<Vec<DownloadItem>, LaunchError> {
        let objects_dir = self.spec.assets_dir().join("objects");
        let mut items = Vec::with_capacity(index.objects.len());

        for (name, object) in &index.objects {
            let relative = object.relative_path().ok_or_else(|| LaunchError::Unknown {
                source: anyhow::anyhow!("malformed asset hash {:?} for {}", object.hash, name),
            })?;
            items.push(DownloadItem {
                url: format!("{}{}", RESOURCES_BASE_URL, relative),
                path: objects_dir.join(&relative),
                sha1: Some(object.hash.clone()),
            });
        }

        Ok(items)
    }

    /// Run a batch of downloads concurrently against one tracker. Every
    /// failure is reported into the attempt's sink; the first one cancels the
    /// tracker so in-flight transfers stop, the sink demotes the rest to log
    /// lines. The caller reads the surfaced error off the sink's receiver.
    async fn run_downloads(
        &self,
        items: Vec<DownloadItem>,
        tracker: &Arc<ProgressTracker>,
        sink: &ErrorSink,
    ) -> Result<(), LaunchError> {
        tracker.begin(items.len());
        if items.is_empty() {
            return Ok(());
        }

        let mut failed = false;
        let mut stream = futures::stream::iter(items.into_iter().map(|item| {
            let client = self.client.clone();
            let tracker = tracker.clone();
            async move {
                let result = download_to_path(
                    &client,
                    &item.url,
                    &item.path,
                    item.sha1.as_deref(),
                    &tracker,
                )
                .await;
                if result.is_ok() {
                    tracker.inc(1);
                }
                result
            }
        }))
        .buffer_unordered(DOWNLOAD_CONCURRENCY);

        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                if sink.report(e) {
                    tracker.cancel();
                }
                failed = true;
            }
        }

        if failed {
            // Placeholder result; launch() replaces it with whichever error
            // won the sink race
            Err(LaunchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Assemble the process argument vector: JVM arguments (memory, custom,
    /// document-provided), then the launcher-supplied natives path, the
    /// classpath, the main class, and finally the game arguments
    fn build_argv(&self, access_token: &str, classpath: &str) -> Result<Vec<String>, LaunchError> {
        let arguments = self
            .document
            .arguments
            .clone()
            .unwrap_or_else(|| Arguments {
                game: vec![],
                jvm: vec![],
            });

        let assets_index_name = self
            .document
            .asset_index
            .as_ref()
            .map(|i| i.id.clone())
            .unwrap_or_else(|| self.document.assets.clone());

        let mut engine = TemplateEngine::new();
        engine
            .apply_spec(&self.spec)
            .set_assets_index_name(&assets_index_name)
            .set_version_type(&self.document.version_type)
            .set_access_token(access_token);

        let mut features = HashMap::new();
        if self.spec.window_width.is_some() && self.spec.window_height.is_some() {
            features.insert("has_custom_resolution".to_string(), true);
        }

        let main_class =
            self.document
                .main_class
                .clone()
                .ok_or_else(|| LaunchError::Unknown {
                    source: anyhow::anyhow!("version {} has no main class", self.document.id),
                })?;

        let mut argv: Vec<String> = Vec::new();

        if let Some(min) = self.spec.min_memory {
            argv.push(format!("-Xms{}M", min));
        }
        if let Some(max) = self.spec.max_memory {
            argv.push(format!("-Xmx{}M", max));
        }
        argv.extend(self.spec.jvm_args.iter().cloned());

        let jvm_rendered = engine.render(&flatten_tokens(&arguments.jvm, self.os, &features));
        argv.extend(sanitize_jvm_args(jvm_rendered));

        argv.push(format!(
            "-Djava.library.path={}",
            self.spec.natives_dir().to_string_lossy()
        ));
        argv.push("-cp".to_string());
        argv.push(classpath.to_string());
        argv.push(main_class);

        argv.extend(engine.render(&flatten_tokens(&arguments.game, self.os, &features)));
        argv.extend(self.spec.game_args.iter().cloned());

        Ok(argv)
    }

    async fn spawn_game(&self, access_token: &str) -> Result<GameInstance, LaunchError> {
        let unknown = |source: anyhow::Error| LaunchError::Unknown { source };

        let classpath = build_classpath(
            &self.document.libraries,
            &self.spec.libraries_dir(),
            &self.spec.client_jar(),
            self.os,
        )
        .map_err(unknown)?;

        let argv = self.build_argv(access_token, &classpath)?;

        tokio::fs::create_dir_all(&self.spec.game_dir)
            .await
            .map_err(|e| LaunchError::CreatingFile {
                path: self.spec.game_dir.display().to_string(),
                source: e,
            })?;

        log::info!("Spawning game process for {}", self.spec.instance_id);
        log::debug!("Java: {:?}", self.spec.java_path);
        log::debug!("Args: {:?}", argv);

        let mut command = tokio::process::Command::new(&self.spec.java_path);
        command
            .args(&argv)
            .current_dir(&self.spec.game_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| unknown(anyhow::Error::new(e).context("spawning game process")))?;

        let pid = child
            .id()
            .ok_or_else(|| unknown(anyhow::anyhow!("spawned process has no PID")))?;

        let instance = GameInstance {
            instance_id: self.spec.instance_id.clone(),
            version_id: self.spec.version_id.clone(),
            pid,
            started_at: chrono::Utc::now(),
            game_dir: self.spec.game_dir.clone(),
        };

        // Registration is the at-most-one gate; losing the race means another
        // attempt spawned first, so this process must die
        if let Err(e) = self.registry.register(instance.clone()).await {
            log::warn!(
                "Instance {} was launched concurrently; killing duplicate PID {}",
                self.spec.instance_id,
                pid
            );
            let _ = child.kill().await;
            return Err(e);
        }

        let registry = self.registry.clone();
        let instance_id = self.spec.instance_id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    log::info!(
                        "Game process {} (PID {}) exited with {}",
                        instance_id,
                        pid,
                        status
                    );
                }
                Err(e) => {
                    log::error!(
                        "Failed to wait for game process {} (PID {}): {}",
                        instance_id,
                        pid,
                        e
                    );
                }
            }
            registry.unregister(&instance_id).await;
        });

        log::info!(
            "Instance {} started (PID {})",
            self.spec.instance_id,
            pid
        );
        Ok(instance)
    }
}

/// Document JVM tokens that duplicate launcher-supplied values are dropped:
/// the classpath flag pair and any token with an unresolved placeholder
fn sanitize_jvm_args(rendered: Vec<String>) -> Vec<String> {
    rendered
        .into_iter()
        .filter(|token| token != "-cp" && token != "-classpath")
        .filter(|token| !token.contains("${"))
        .collect()
}
