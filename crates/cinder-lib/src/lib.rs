pub mod game;

// Re-export the types most callers need
pub use game::launcher::{
    GameInstance, LaunchError, LaunchPipeline, LaunchSpec, ProcessRegistry, ProgressTracker,
    TemplateEngine,
};
pub use game::metadata::{PartialVersion, VersionCatalog, VersionType};
pub use game::version::{
    CatalogProvider, DocumentProvider, Library, VersionDocument, VersionError, VersionResolver,
};
