//! Directory-backed asset store.
//!
//! Layout under the root:
//! ```text
//! objects/<key>        raw bytes
//! meta/<key>.json      content type and owner
//! tmp/                 staging area for atomic writes
//! ```
//! Objects are staged in `tmp/` and renamed into place, so a reader opening
//! `objects/<key>` sees either the previous file or the complete new one.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::assets::store::{
    content_type_for, normalize_key, Asset, AssetError, AssetFuture, AssetStore, AssetSummary,
};

#[derive(Debug, Serialize, Deserialize)]
struct AssetMeta {
    content_type: String,
    owner: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    /// Open (and create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AssetError> {
        let root = root.as_ref().to_path_buf();
        for dir in ["objects", "meta", "tmp"] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.json", key))
    }

    async fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> Result<(), AssetError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.root.join("tmp").join(uuid::Uuid::new_v4().to_string());
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, dest).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_meta(&self, key: &str) -> Result<Option<AssetMeta>, AssetError> {
        match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn not_found_as<T>(key: &str, result: io::Result<T>) -> Result<T, AssetError> {
    result.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AssetError::NotFound(key.to_string()),
        _ => AssetError::Io(e),
    })
}

impl AssetStore for FsAssetStore {
    fn put<'a>(&'a self, key: &'a str, asset: Asset) -> AssetFuture<'a, ()> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            let meta = serde_json::to_vec(&AssetMeta {
                content_type: asset.content_type.clone(),
                owner: asset.owner.clone(),
            })?;
            self.write_atomic(&self.meta_path(&key), &meta).await?;
            self.write_atomic(&self.object_path(&key), &asset.bytes).await
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> AssetFuture<'a, Arc<Asset>> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            let bytes = not_found_as(&key, tokio::fs::read(self.object_path(&key)).await)?;
            let meta = self.read_meta(&key).await?;
            let (content_type, owner) = match meta {
                Some(meta) => (meta.content_type, meta.owner),
                None => (content_type_for(&key).to_string(), None),
            };
            Ok(Arc::new(Asset {
                bytes: bytes.into(),
                content_type,
                owner,
            }))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> AssetFuture<'a, bool> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            let existed = match tokio::fs::remove_file(self.object_path(&key)).await {
                Ok(()) => true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            match tokio::fs::remove_file(self.meta_path(&key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            Ok(existed)
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> AssetFuture<'a, Vec<AssetSummary>> {
        Box::pin(async move {
            let objects = self.root.join("objects");
            let prefix = prefix.trim_start_matches('/').to_string();

            let mut rows = tokio::task::spawn_blocking(move || -> Result<_, AssetError> {
                let mut rows = Vec::new();
                for entry in WalkDir::new(&objects).min_depth(1) {
                    let entry = entry?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&objects) else {
                        continue;
                    };
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(&prefix) {
                        rows.push(AssetSummary {
                            key,
                            size: entry.metadata()?.len(),
                            owner: None,
                        });
                    }
                }
                Ok(rows)
            })
            .await??;

            for row in &mut rows {
                row.owner = self.read_meta(&row.key).await?.and_then(|m| m.owner);
            }
            rows.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(rows)
        })
    }
}
