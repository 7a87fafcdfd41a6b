//! Shared asset store interface and in-memory backend.
//!
//! # Design Decisions
//! - Keys are store-relative paths: no leading `/`, no `.`/`..`/empty segments
//! - Each key holds one `Arc<Asset>`; replacing the `Arc` is the atomic overwrite
//! - The store never enforces ownership; owners are recorded for publishers

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type AssetFuture<'a, T> = BoxFuture<'a, Result<T, AssetError>>;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),
    #[error("invalid asset key `{0}`")]
    InvalidKey(String),
    #[error("asset store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset metadata is corrupt: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("failed to walk asset tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("asset task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Bytes,
    pub content_type: String,
    /// Namespace of the publisher that wrote it.
    pub owner: Option<String>,
}

impl Asset {
    /// Asset with a content type guessed from the key's extension.
    pub fn for_key(key: &str, bytes: impl Into<Bytes>, owner: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type_for(key).to_string(),
            owner,
        }
    }
}

/// Listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub key: String,
    pub size: u64,
    pub owner: Option<String>,
}

/// Shared store multiplexing every page service's static files.
pub trait AssetStore: Send + Sync + fmt::Debug {
    fn put<'a>(&'a self, key: &'a str, asset: Asset) -> AssetFuture<'a, ()>;

    fn get<'a>(&'a self, key: &'a str) -> AssetFuture<'a, Arc<Asset>>;

    /// Returns whether the key existed.
    fn delete<'a>(&'a self, key: &'a str) -> AssetFuture<'a, bool>;

    /// All keys starting with `prefix`, sorted.
    fn list<'a>(&'a self, prefix: &'a str) -> AssetFuture<'a, Vec<AssetSummary>>;
}

/// Normalize a raw key into store-relative form.
pub fn normalize_key(raw: &str) -> Result<String, AssetError> {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(AssetError::InvalidKey(raw.to_string()));
    }
    let bad_segment = trimmed
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad_segment || trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(AssetError::InvalidKey(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Join a destination prefix and a relative path into a key.
pub fn join_key(prefix: &str, relative: &str) -> Result<String, AssetError> {
    let prefix = prefix.trim_matches('/');
    let relative = relative.trim_start_matches('/');
    if prefix.is_empty() {
        normalize_key(relative)
    } else {
        normalize_key(&format!("{}/{}", prefix, relative))
    }
}

/// Content type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("wasm") => "application/wasm",
        Some("webmanifest") => "application/manifest+json",
        _ => "application/octet-stream",
    }
}

/// Store kept in a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    objects: DashMap<String, Arc<Asset>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl AssetStore for MemoryAssetStore {
    fn put<'a>(&'a self, key: &'a str, asset: Asset) -> AssetFuture<'a, ()> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            self.objects.insert(key, Arc::new(asset));
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> AssetFuture<'a, Arc<Asset>> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            self.objects
                .get(&key)
                .map(|r| r.value().clone())
                .ok_or(AssetError::NotFound(key))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> AssetFuture<'a, bool> {
        Box::pin(async move {
            let key = normalize_key(key)?;
            Ok(self.objects.remove(&key).is_some())
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> AssetFuture<'a, Vec<AssetSummary>> {
        Box::pin(async move {
            let prefix = prefix.trim_start_matches('/');
            let mut rows: Vec<_> = self
                .objects
                .iter()
                .filter(|r| r.key().starts_with(prefix))
                .map(|r| AssetSummary {
                    key: r.key().clone(),
                    size: r.value().bytes.len() as u64,
                    owner: r.value().owner.clone(),
                })
                .collect();
            rows.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("/_next/static/app.js").unwrap(), "_next/static/app.js");
        assert!(normalize_key("../etc/passwd").is_err());
        assert!(normalize_key("a//b").is_err());
        assert!(normalize_key("/").is_err());
        assert_eq!(join_key("_next/static/", "chunks/a.js").unwrap(), "_next/static/chunks/a.js");
        assert_eq!(join_key("", "/public/logo.svg").unwrap(), "public/logo.svg");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("_next/static/app.js"), "application/javascript");
        assert_eq!(content_type_for("public/Logo.PNG"), "image/png");
        assert_eq!(content_type_for("public/LICENSE"), "application/octet-stream");
        assert_eq!(content_type_for("dir.v2/noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_memory_store_overwrite_and_list() {
        let store = MemoryAssetStore::new();
        store
            .put("public/a.txt", Asset::for_key("public/a.txt", "one", Some("home".into())))
            .await
            .unwrap();
        let before = store.get("/public/a.txt").await.unwrap();

        store
            .put("public/a.txt", Asset::for_key("public/a.txt", "two", Some("home".into())))
            .await
            .unwrap();

        // A reader holding the old Arc still sees whole old bytes.
        assert_eq!(&before.bytes[..], b"one");
        assert_eq!(&store.get("public/a.txt").await.unwrap().bytes[..], b"two");

        store.put("public/b.txt", Asset::for_key("public/b.txt", "b", None)).await.unwrap();
        store.put("_next/c.js", Asset::for_key("_next/c.js", "c", None)).await.unwrap();
        let keys: Vec<_> = store.list("public/").await.unwrap().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["public/a.txt", "public/b.txt"]);

        assert!(store.delete("public/b.txt").await.unwrap());
        assert!(!store.delete("public/b.txt").await.unwrap());
        assert!(matches!(store.get("public/b.txt").await, Err(AssetError::NotFound(_))));
    }
}
