//! Core of the room studio: turn a room photo into shoppable element
//! searches and a saved project, gated by the user's subscription.

pub mod config;
pub mod detection;
pub mod orchestrator;
pub mod persistence;
pub mod quota;
pub mod store;
pub mod upload;

pub use config::{ConfigError, StudioConfig, TierTable, VisionConfig};
pub use detection::{AnalysisError, ElementDetectionClient, OpenAiVisionService, RawSuggestions, VisionService};
pub use orchestrator::{AuthContext, CreationError, CreationOutcome, ProjectError, Studio};
pub use persistence::{CreatedProject, InMemoryProjectService, ProjectService, ServiceError};
pub use quota::SubscriptionSnapshot;
pub use store::ProjectStore;
pub use upload::{
    DataUrlPreviews, ImageError, ImageFile, PreviewBackend, SelectionChange, SelectionError, UploadSnapshot,
    UploadStatus, UploadWorkflow,
};

/// Installs `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info")).try_init();
}
