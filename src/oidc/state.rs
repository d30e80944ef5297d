//! Nonce store — single-use login state held between the OIDC login
//! initiation and the launch callback.
//!
//! The [`NonceStore`] trait abstracts over storage backends. The only current
//! implementation is [`InMemoryNonceStore`], backed by a `DashMap` with a
//! background sweeper that evicts expired entries.
//!
//! # Design
//!
//! Entries are indexed by **nonce** because the nonce is the value that comes
//! back inside the signed `id_token`; the stored payload is the `state` the
//! browser must echo alongside it. [`NonceStore::take_and_delete`] removes the
//! entry in the same operation that reads it, so two concurrent launches
//! presenting the same nonce can never both validate.
//!
//! The in-memory backend assumes the tool runs as one logical process. A
//! multi-instance deployment must put a shared store behind [`NonceStore`],
//! or the single-use guarantee only holds per instance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::RngExt;
use tracing::debug;

/// State recorded at login initiation, consumed exactly once at launch.
#[derive(Debug, Clone)]
struct PendingLogin {
    state: String,
    created_at: Instant,
}

/// Generate a cryptographically random, URL-safe protocol value.
///
/// 32 random bytes, base64url without padding (43 chars, 256 bits of
/// entropy). Used for both the `nonce` and the `state` parameter.
#[must_use]
pub fn generate_value() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    base64::Engine::encode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        random_bytes,
    )
}

/// Trait abstracting the nonce storage backend.
///
/// Implementations must be `Send + Sync` because the store is shared across
/// async tasks.
#[async_trait::async_trait]
pub trait NonceStore: Send + Sync + 'static {
    /// Record `state` under `nonce`, replacing any previous entry for the
    /// same nonce.
    async fn put(&self, nonce: &str, state: &str);

    /// Atomically remove and return the state stored under `nonce`.
    ///
    /// Returns `None` if the nonce was never stored, was already consumed, or
    /// has expired. At most one concurrent caller can receive `Some` for a
    /// given nonce.
    async fn take_and_delete(&self, nonce: &str) -> Option<String>;

    /// Remove all expired entries. Called periodically by the background
    /// sweeper.
    async fn sweep_expired(&self) -> usize;
}

/// In-memory nonce store backed by a `DashMap`.
///
/// Expiry is enforced twice: lazily on [`NonceStore::take_and_delete`] (an
/// expired entry is removed and reported as a miss) and periodically by
/// [`spawn_sweeper`] so abandoned logins do not accumulate.
pub struct InMemoryNonceStore {
    entries: DashMap<String, PendingLogin>,
    ttl: Duration,
}

impl InMemoryNonceStore {
    /// Create an empty store whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait::async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn put(&self, nonce: &str, state: &str) {
        self.entries.insert(
            nonce.to_string(),
            PendingLogin {
                state: state.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    async fn take_and_delete(&self, nonce: &str) -> Option<String> {
        // DashMap::remove is the atomic take: losers of the race see None.
        let (_, entry) = self.entries.remove(nonce)?;

        if entry.created_at.elapsed() >= self.ttl {
            debug!("Discarded expired login state on take");
            return None;
        }

        Some(entry.state)
    }

    async fn sweep_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().created_at.elapsed() >= self.ttl)
            .map(|e| e.key().clone())
            .collect();

        let mut count = 0;
        for nonce in expired {
            // Re-check under the shard lock so a concurrent overwrite of the
            // same nonce survives the sweep.
            if self
                .entries
                .remove_if(&nonce, |_, v| v.created_at.elapsed() >= self.ttl)
                .is_some()
            {
                count += 1;
            }
        }
        count
    }
}

/// Spawn a background task that sweeps expired entries every `interval`.
///
/// The task exits when the `shutdown` receiver fires.
pub fn spawn_sweeper(
    store: Arc<dyn NonceStore>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = store.sweep_expired().await;
                    if swept > 0 {
                        debug!(count = swept, "Swept expired login state");
                    }
                }
                _ = shutdown.recv() => {
                    debug!("Nonce sweeper shutting down");
                    break;
                }
            }
        }
    });
}
