pub mod classpath;
pub mod downloader;
pub mod error;
pub mod natives;
/// Game launch pipeline: downloads, natives, authentication, process spawn
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use classpath::{build_classpath, maven_to_path};
pub use downloader::{download_json, download_to_path};
pub use error::{ErrorSink, LaunchError};
pub use natives::extract_natives;
pub use pipeline::{AssetIndex, AssetObject, Authenticator, LaunchPipeline, StaticTokenAuthenticator};
pub use progress::{ProgressState, ProgressTracker};
pub use registry::ProcessRegistry;
pub use template::{flatten_tokens, TemplateEngine};
pub use types::{GameInstance, LaunchSpec, OsType, ProcessHandle};
