//! Shared authentication token with absolute expiry.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use consync_core::config::ApiConfig;
use consync_core::Token;
use consync_gateway::RemoteGateway;

use crate::error::SyncError;

/// Monotonic time source; swapped out in tests to step past the TTL.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CachedToken {
    token: Token,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_valid_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// One token shared by every caller.
///
/// The lock is held across the login call, so concurrent callers that find
/// the cache empty or expired wait for a single login instead of each
/// issuing their own. A failed login leaves the cache as it was and the next
/// call simply tries again.
pub struct TokenCache {
    gateway: Arc<dyn RemoteGateway>,
    username: String,
    password: String,
    lang_code: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(gateway: Arc<dyn RemoteGateway>, api: &ApiConfig) -> Self {
        Self {
            gateway,
            username: api.username.clone(),
            password: api.password.clone(),
            lang_code: api.lang_code.clone(),
            ttl: api.token_ttl(),
            clock: Arc::new(SystemClock),
            state: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A valid token, logging in only when none is cached or it has expired.
    pub fn get_token(&self) -> Result<Token, SyncError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        if let Some(cached) = state.as_ref().filter(|c| c.is_valid_at(now)) {
            return Ok(cached.token.clone());
        }

        match self
            .gateway
            .login(&self.username, &self.password, &self.lang_code)
        {
            Ok(token) => {
                tracing::info!(ttl_secs = self.ttl.as_secs(), "token refreshed");
                *state = Some(CachedToken {
                    token: token.clone(),
                    expires_at: now.checked_add(self.ttl),
                });
                Ok(token)
            }
            Err(err) => {
                tracing::error!(error = %err, "login failed");
                Err(SyncError::Token(err.message()))
            }
        }
    }

    /// Drop the cached token; the next [`TokenCache::get_token`] logs in.
    pub fn invalidate(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
