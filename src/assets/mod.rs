//! Shared static asset storage.
//!
//! # Data Flow
//! ```text
//! Build output directory ({path → bytes})
//!     → publisher.rs (prefix, content type, owner)
//!     → store.rs AssetStore (memory) | fs.rs FsAssetStore (disk)
//!     → read by the edge distribution's static origin
//! ```

pub mod fs;
pub mod publisher;
pub mod store;

use std::sync::Arc;

use crate::config::schema::AssetsConfig;

pub use fs::FsAssetStore;
pub use publisher::{AssetPublisher, AssetTree, PublishOptions, PublishReport};
pub use store::{Asset, AssetError, AssetStore, AssetSummary, MemoryAssetStore};

/// Open the store backend selected by configuration.
pub fn open(config: &AssetsConfig) -> Result<Arc<dyn AssetStore>, AssetError> {
    match &config.root {
        Some(root) => {
            tracing::info!(root = %root, bucket = %config.bucket_name, "Filesystem asset store opened");
            Ok(Arc::new(FsAssetStore::open(root)?))
        }
        None => {
            tracing::info!(bucket = %config.bucket_name, "In-memory asset store opened");
            Ok(Arc::new(MemoryAssetStore::new()))
        }
    }
}
