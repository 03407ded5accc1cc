pub mod catalog;
pub mod download;
pub mod store;

pub use catalog::{ArtifactFile, ArtifactSpec, FileKind, get_artifact, list_artifacts};
pub use download::{ArtifactFetcher, OfflineFetcher};
pub use store::{ArtifactState, ArtifactStatus, ArtifactStore, StorePolicy};

#[cfg(feature = "model-download")]
pub use download::HttpFetcher;

use std::path::PathBuf;
use std::sync::Arc;

/// Get the directory where artifacts are stored by default.
///
/// Uses `~/.cache/voxgate/models/` on Linux/Unix.
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("voxgate")
        .join("models")
}

/// Fetcher matching the build and configuration.
#[cfg(feature = "model-download")]
pub fn default_fetcher(auto_download: bool) -> Arc<dyn ArtifactFetcher> {
    if auto_download {
        Arc::new(HttpFetcher::new())
    } else {
        Arc::new(OfflineFetcher)
    }
}

/// Fetcher matching the build and configuration.
#[cfg(not(feature = "model-download"))]
pub fn default_fetcher(_auto_download: bool) -> Arc<dyn ArtifactFetcher> {
    Arc::new(OfflineFetcher)
}
