pub mod launcher;
pub mod metadata;
pub mod version;

// Re-export commonly used types
pub use launcher::{GameInstance, LaunchPipeline, LaunchSpec, ProgressTracker};
pub use metadata::{PartialVersion, VersionCatalog};
pub use version::{VersionDocument, VersionResolver};
