use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use secrecy::SecretString;
use tokio::sync::{Mutex, OnceCell};

use crate::{AuthError, TokenSource};

/// Tokens this close to expiry are treated as expired
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// An access token together with the refresh generation that produced it
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    generation: u64,
}

impl AccessToken {
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Refresh counter value when this token was issued
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct CachedToken {
    token: AccessToken,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() + EXPIRY_SKEW < at)
    }
}

/// Owner of the cached access token for one credential domain
///
/// The cache lock is held across a refresh, so at most one refresh is in
/// flight and callers that queued behind it reuse its result.
pub struct AuthManager {
    name: String,
    source: Arc<dyn TokenSource>,
    cache: Mutex<Option<CachedToken>>,
    generation: AtomicU64,
}

impl AuthManager {
    pub fn new(name: impl Into<String>, source: Arc<dyn TokenSource>) -> Self {
        Self {
            name: name.into(),
            source,
            cache: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached token, refreshing first when it is missing or stale
    pub async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
            return Ok(cached.token.clone());
        }

        self.refresh_locked(&mut cache).await
    }

    /// Force a refresh, sharing any refresh that completes while waiting
    pub async fn refresh_token(&self) -> Result<AccessToken, AuthError> {
        let observed = self.generation.load(Ordering::Acquire);
        self.refresh_after(observed).await
    }

    /// Refresh unless a token newer than `stale_generation` already exists
    ///
    /// Used after an upstream rejects a token: every caller holding the
    /// rejected token converges on a single replacement.
    pub async fn refresh_after(&self, stale_generation: u64) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref().filter(|c| c.token.generation > stale_generation) {
            tracing::debug!(provider = %self.name, "reusing token refreshed by another caller");
            return Ok(cached.token.clone());
        }

        self.refresh_locked(&mut cache).await
    }

    async fn refresh_locked(&self, cache: &mut Option<CachedToken>) -> Result<AccessToken, AuthError> {
        tracing::debug!(provider = %self.name, "refreshing access token");

        let issued = self.source.fetch_token().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "access token refresh failed");
            e
        })?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = AccessToken {
            secret: issued.access_token,
            generation,
        };

        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: issued.expires_in.map(|ttl| Instant::now() + ttl),
        });

        Ok(token)
    }
}

type ManagerInit = Box<dyn Fn() -> Result<AuthManager, AuthError> + Send + Sync>;

/// An [`AuthManager`] built on first use
///
/// Initialisation runs at most once; concurrent first callers wait for the
/// same instance. A failed initialisation is retried by the next caller.
pub struct LazyAuthManager {
    cell: OnceCell<AuthManager>,
    init: ManagerInit,
}

impl LazyAuthManager {
    pub fn new(init: impl Fn() -> Result<AuthManager, AuthError> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            init: Box::new(init),
        }
    }

    /// Wrap an already constructed manager
    pub fn ready(manager: AuthManager) -> Self {
        Self {
            cell: OnceCell::new_with(Some(manager)),
            init: Box::new(|| Err(AuthError::MissingCredentials("already initialised".to_owned()))),
        }
    }

    /// Get the manager, constructing it on first call
    pub async fn get(&self) -> Result<&AuthManager, AuthError> {
        self.cell.get_or_try_init(|| async { (self.init)() }).await
    }
}
