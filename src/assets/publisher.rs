//! Asset publishing for one page service.
//!
//! # Responsibilities
//! - Upload a static-file tree under a destination prefix
//! - Walk build output directories into such trees
//! - Optionally prune this service's keys that vanished from the tree
//!
//! # Design Decisions
//! - Re-publishing a key overwrites it; the store swaps whole objects
//! - Overwriting another service's key is allowed but logged
//! - Pruning only touches keys owned by this service

use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::assets::store::{join_key, Asset, AssetError, AssetStore};
use crate::observability::metrics;

/// `{relative path → bytes}` produced by a build.
pub type AssetTree = BTreeMap<String, Bytes>;

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    pub prune: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub uploaded: usize,
    pub bytes: u64,
    /// Keys that previously belonged to another service.
    pub foreign_overwrites: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone)]
pub struct AssetPublisher {
    store: Arc<dyn AssetStore>,
    service: String,
}

impl AssetPublisher {
    pub fn new(store: Arc<dyn AssetStore>, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Upload every file in `tree` under `destination_prefix`.
    pub async fn publish(
        &self,
        tree: AssetTree,
        destination_prefix: &str,
        options: PublishOptions,
    ) -> Result<PublishReport, AssetError> {
        let prefix = destination_prefix.trim_matches('/');
        let listing_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };
        let existing: HashMap<String, Option<String>> = self
            .store
            .list(&listing_prefix)
            .await?
            .into_iter()
            .map(|row| (row.key, row.owner))
            .collect();

        let mut report = PublishReport::default();
        let mut published = Vec::with_capacity(tree.len());

        for (relative, bytes) in tree {
            let key = join_key(prefix, &relative)?;
            if let Some(Some(owner)) = existing.get(&key) {
                if owner != &self.service {
                    tracing::warn!(
                        service = %self.service,
                        owner = %owner,
                        key = %key,
                        "Overwriting asset published by another service"
                    );
                    report.foreign_overwrites += 1;
                }
            }

            report.bytes += bytes.len() as u64;
            let asset = Asset::for_key(&key, bytes, Some(self.service.clone()));
            self.store.put(&key, asset).await?;
            report.uploaded += 1;
            published.push(key);
        }

        if options.prune {
            for (key, owner) in &existing {
                let ours = owner.as_deref() == Some(self.service.as_str());
                if ours && !published.contains(key) && self.store.delete(key).await? {
                    report.pruned += 1;
                }
            }
        }

        tracing::info!(
            service = %self.service,
            prefix = %prefix,
            uploaded = report.uploaded,
            bytes = report.bytes,
            pruned = report.pruned,
            "Assets published"
        );
        metrics::record_assets_published(&self.service, report.uploaded);
        Ok(report)
    }

    /// Publish a build output directory.
    pub async fn publish_dir(
        &self,
        dir: impl AsRef<Path>,
        destination_prefix: &str,
        options: PublishOptions,
    ) -> Result<PublishReport, AssetError> {
        let tree = read_tree(dir.as_ref().to_path_buf()).await?;
        self.publish(tree, destination_prefix, options).await
    }
}

/// Read a directory tree into memory, keyed by `/`-separated relative path.
pub async fn read_tree(dir: PathBuf) -> Result<AssetTree, AssetError> {
    tokio::task::spawn_blocking(move || -> Result<AssetTree, AssetError> {
        let mut tree = AssetTree::new();
        for entry in WalkDir::new(&dir).min_depth(1).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            tree.insert(key, Bytes::from(std::fs::read(entry.path())?));
        }
        Ok(tree)
    })
    .await?
}
