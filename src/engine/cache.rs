//! Process-wide cache of loaded engines.

use crate::engine::{EngineHandle, EngineKey, EngineLoader};
use crate::error::Result;
use crate::sync::KeyedLocks;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lazily loads each [`EngineKey`] once and shares the handle.
///
/// Lookups take a read lock only. A miss takes that key's own lock, checks
/// again, and loads while holding nothing else, so loads of different keys
/// overlap and readers of loaded keys are never held up by a load.
pub struct ModelCache {
    engines: RwLock<HashMap<EngineKey, EngineHandle>>,
    loading: KeyedLocks<EngineKey>,
    loader: Arc<dyn EngineLoader>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            loading: KeyedLocks::new(),
            loader,
        }
    }

    /// Return the engine for `key`, loading it on first use.
    ///
    /// A failed load leaves no entry behind; the next call tries again.
    pub async fn get_or_load(&self, key: &EngineKey) -> Result<EngineHandle> {
        if let Some(handle) = self.engines.read().await.get(key) {
            return Ok(handle.clone());
        }

        let _guard = self.loading.lock(key).await;
        if let Some(handle) = self.engines.read().await.get(key) {
            return Ok(handle.clone());
        }

        tracing::info!(%key, "loading engine");
        let handle = match self.loader.load(key).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(%key, error = %e, "engine load failed");
                return Err(e);
            }
        };
        self.engines
            .write()
            .await
            .insert(key.clone(), handle.clone());
        tracing::info!(%key, "engine ready");
        Ok(handle)
    }

    /// Drop the cached engine for `key`.
    ///
    /// Callers already holding the handle keep a working engine until they
    /// release it.
    pub async fn evict(&self, key: &EngineKey) -> bool {
        let removed = self.engines.write().await.remove(key).is_some();
        if removed {
            tracing::info!(%key, "engine evicted");
        }
        removed
    }

    pub async fn contains(&self, key: &EngineKey) -> bool {
        self.engines.read().await.contains_key(key)
    }

    /// Keys currently loaded, sorted.
    pub async fn loaded_keys(&self) -> Vec<EngineKey> {
        let mut keys: Vec<EngineKey> = self.engines.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
