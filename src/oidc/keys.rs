//! Platform key resolution — JWKS caching and `kid` lookup.
//!
//! # Resolution flow
//!
//! 1. Take the JWKS URL from the platform registration, or resolve it from
//!    the issuer's discovery document when the registration leaves it unset.
//! 2. Serve the JWK Set from a per-issuer cache; a stale entry is a miss and
//!    triggers a refetch.
//! 3. Look up the token header's `kid`. An unknown `kid` triggers a single
//!    forced refresh before failing, which covers platform key rotation
//!    without allowing indefinite refetching for a key that does not exist.
//!
//! Only RSA keys are usable because launches are verified as RS256. A token
//! header without a `kid` is accepted only when the platform publishes
//! exactly one RSA key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jsonwebtoken::{
    DecodingKey,
    jwk::{AlgorithmParameters, JwkSet},
};
use tokio::sync::Mutex;
use tracing::debug;

use super::discovery::DiscoveryDocument;
use crate::registry::PlatformRegistration;
use crate::{Error, Result};

/// Cached JWK Set entry.
struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedJwks {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }
}

/// Resolves `id_token` signing keys from platform JWKS documents.
///
/// One cache entry per issuer. Concurrent misses for the same issuer are
/// serialized behind a per-issuer lock so a burst of launches triggers one
/// upstream fetch, not one per launch.
pub struct KeyResolver {
    cache: DashMap<String, CachedJwks>,
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
    http: reqwest::Client,
    ttl: Duration,
}

impl KeyResolver {
    /// Create a resolver whose cache entries expire after `ttl`.
    #[must_use]
    pub fn new(http: reqwest::Client, ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            fetch_locks: DashMap::new(),
            http,
            ttl,
        }
    }

    /// Resolve the verification key for a launch from `platform`.
    ///
    /// `kid` is the key ID from the unverified token header, when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyResolution`] if the JWKS cannot be located or
    /// fetched, and [`Error::UnknownKeyId`] if the set was fetched but holds
    /// no usable key for `kid` even after a forced refresh.
    pub async fn resolve(
        &self,
        platform: &PlatformRegistration,
        kid: Option<&str>,
    ) -> Result<DecodingKey> {
        let jwks_url = self.jwks_url_for(platform).await?;

        // Cached set first.
        let jwks = self
            .get_or_fetch(&platform.issuer, &jwks_url, false)
            .await?;
        if let Some(key) = find_key_in_set(&jwks, kid) {
            return Ok(key);
        }

        // Unknown kid: refresh once and retry.
        debug!(
            issuer = %platform.issuer,
            kid = kid.unwrap_or("(none)"),
            "Key not found in cached JWKS, refreshing"
        );
        let jwks = self.get_or_fetch(&platform.issuer, &jwks_url, true).await?;
        find_key_in_set(&jwks, kid)
            .ok_or_else(|| Error::UnknownKeyId(kid.unwrap_or("(none)").to_string()))
    }

    /// JWKS URL from the registration, falling back to OIDC discovery.
    async fn jwks_url_for(&self, platform: &PlatformRegistration) -> Result<String> {
        if let Some(url) = &platform.jwk_set_url {
            return Ok(url.clone());
        }

        let document = DiscoveryDocument::fetch(&self.http, &platform.issuer)
            .await
            .map_err(|e| Error::KeyResolution(e.to_string()))?;
        document.jwks_uri.ok_or_else(|| {
            Error::KeyResolution(format!(
                "discovery document for {} does not advertise a jwks_uri",
                platform.issuer
            ))
        })
    }

    /// Return the cached JWKS for `issuer`, or fetch from `jwks_url`.
    ///
    /// If `force_refresh` is `true`, the cache is bypassed regardless of TTL.
    async fn get_or_fetch(
        &self,
        issuer: &str,
        jwks_url: &str,
        force_refresh: bool,
    ) -> Result<JwkSet> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(issuer) {
                if !cached.is_stale() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let lock = Arc::clone(&*self.fetch_locks.entry(issuer.to_string()).or_default());
        let _guard = lock.lock().await;

        // Another task may have refilled the cache while we waited.
        if !force_refresh {
            if let Some(cached) = self.cache.get(issuer) {
                if !cached.is_stale() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(issuer = %issuer, url = %jwks_url, "Fetching platform JWKS");
        let response = self.http.get(jwks_url).send().await.map_err(|e| {
            Error::KeyResolution(format!("JWKS fetch from {jwks_url} failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(Error::KeyResolution(format!(
                "JWKS endpoint {jwks_url} returned HTTP {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| Error::KeyResolution(format!("invalid JWKS from {jwks_url}: {e}")))?;

        self.cache.insert(
            issuer.to_string(),
            CachedJwks {
                keys: jwks.clone(),
                fetched_at: Instant::now(),
                ttl: self.ttl,
            },
        );

        Ok(jwks)
    }
}

/// Find an RSA key in a `JwkSet` and convert it to a [`DecodingKey`].
///
/// With a `kid`, only the matching entry is considered. Without one, the set
/// must contain exactly one RSA key for the lookup to be unambiguous.
fn find_key_in_set(jwks: &JwkSet, kid: Option<&str>) -> Option<DecodingKey> {
    if let Some(kid) = kid {
        for jwk in &jwks.keys {
            if jwk.common.key_id.as_deref() != Some(kid) {
                continue;
            }
            return match &jwk.algorithm {
                AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
                _ => None,
            };
        }
        return None;
    }

    let mut rsa_keys = jwks.keys.iter().filter_map(|jwk| match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => Some(rsa),
        _ => None,
    });
    let sole = rsa_keys.next()?;
    if rsa_keys.next().is_some() {
        return None;
    }
    DecodingKey::from_rsa_components(&sole.n, &sole.e).ok()
}
