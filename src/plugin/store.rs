//! In-memory asset store for the dev server.
//!
//! Dev builds never touch the output directory; every emitted file lands
//! here keyed by its URL path and is served from memory.

use std::sync::Arc;

use dashmap::DashMap;
use rolldown_common::{Output, StrOrBytes};

/// Thread-safe in-memory asset store.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    /// Normalized path (starts with `/`) to content.
    assets: Arc<DashMap<String, Arc<Vec<u8>>>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    /// Insert or replace an asset.
    pub fn update(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.assets
            .insert(Self::normalize(path), Arc::new(content.into()));
    }

    /// Store every chunk and asset of a Rolldown output.
    pub fn update_from_outputs(&self, outputs: &[Output]) {
        for output in outputs {
            match output {
                Output::Chunk(chunk) => {
                    self.update(chunk.filename.as_str(), chunk.code.as_bytes());
                    if let Some(map) = &chunk.map {
                        self.update(&format!("{}.map", chunk.filename), map.to_json_string());
                    }
                }
                Output::Asset(asset) => {
                    let bytes = match &asset.source {
                        StrOrBytes::Str(s) => s.as_bytes().to_vec(),
                        StrOrBytes::Bytes(b) => b.clone(),
                    };
                    self.update(asset.filename.as_str(), bytes);
                }
            }
        }
    }

    /// Copy every asset of `other` into this store, replacing same paths.
    pub fn extend_from(&self, other: &AssetStore) {
        for entry in other.assets.iter() {
            self.assets
                .insert(entry.key().clone(), Arc::clone(entry.value()));
        }
    }

    pub fn get(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.assets.get(&Self::normalize(path)).map(|r| Arc::clone(r.value()))
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.assets.iter().map(|r| r.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_normalizes_leading_slash() {
        let store = AssetStore::new();
        store.update("index.js", "code");
        assert_eq!(store.get("/index.js").as_deref().map(Vec::as_slice), Some(&b"code"[..]));
        assert_eq!(store.get("index.js").as_deref().map(Vec::as_slice), Some(&b"code"[..]));
    }

    #[test]
    fn overwrite_replaces_content() {
        let store = AssetStore::new();
        store.update("/assets.json", "{}");
        store.update("/assets.json", "{\"version\":\"1\"}");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("/assets.json").as_deref().map(Vec::as_slice),
            Some(&b"{\"version\":\"1\"}"[..])
        );
    }

    #[test]
    fn paths_sorted() {
        let store = AssetStore::new();
        store.update("meta.js", "");
        store.update("index.js", "");
        assert_eq!(store.paths(), vec!["/index.js", "/meta.js"]);
        assert!(!store.is_empty());
    }

    #[test]
    fn extend_from_replaces_and_keeps_others() {
        let store = AssetStore::new();
        store.update("index.js", "old");
        store.update("meta.js", "meta");
        let staged = AssetStore::new();
        staged.update("index.js", "new");

        store.extend_from(&staged);

        assert_eq!(store.get("index.js").as_deref().map(Vec::as_slice), Some(&b"new"[..]));
        assert_eq!(store.get("meta.js").as_deref().map(Vec::as_slice), Some(&b"meta"[..]));
    }

    #[test]
    fn clones_share_state() {
        let store = AssetStore::new();
        let clone = store.clone();
        let handle = std::thread::spawn(move || clone.update("meta.js", "x"));
        handle.join().unwrap();
        assert!(store.get("meta.js").is_some());
    }
}
