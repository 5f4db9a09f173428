//! Versioned config store with change notification.
//!
//! `ConfigStore<T>` holds the current value as an `Arc<T>` snapshot so that
//! hot loops can grab it without holding a lock across their work, and
//! publishes a version number on a `watch` channel so consumers can react
//! to reloads without polling.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// A shared, versioned configuration value.
///
/// Cloning the store is cheap and every clone observes the same value.
pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    current: RwLock<Arc<T>>,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when a [`ConfigStore`] is replaced.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(ConfigStoreInner {
                current: RwLock::new(Arc::new(initial)),
                version_tx,
            }),
        }
    }

    /// Replace the stored value and notify all watchers. Returns the new version.
    pub async fn replace(&self, value: T) -> u64 {
        let mut guard = self.inner.current.write().await;
        *guard = Arc::new(value);
        drop(guard);

        let mut next = 0;
        self.inner.version_tx.send_modify(|version| {
            *version += 1;
            next = *version;
        });
        next
    }

    /// Current snapshot. The returned `Arc` stays valid across later replacements.
    pub async fn load(&self) -> Arc<T> {
        Arc::clone(&*self.inner.current.read().await)
    }

    /// Number of replacements since creation.
    pub fn version(&self) -> u64 {
        *self.inner.version_tx.borrow()
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait until the store is replaced.
    ///
    /// Returns `Err` once every [`ConfigStore`] handle has been dropped.
    pub async fn changed(&mut self) -> Result<u64, watch::error::RecvError> {
        self.version_rx.changed().await?;
        Ok(*self.version_rx.borrow_and_update())
    }
}
