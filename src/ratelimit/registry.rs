//! Named limiter instances shared across the process.

use std::str::FromStr;
use std::sync::Arc;

use crate::config::LimitsConfig;

use super::limiter::RateLimiter;
use super::store::LimiterStore;

/// The purposes call sites select a limiter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterScope {
    /// Admin/moderation endpoints
    Admin,
    /// General API endpoints
    Api,
    /// Authentication endpoints
    Auth,
}

impl LimiterScope {
    /// The store key namespace for this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterScope::Admin => "admin",
            LimiterScope::Api => "api",
            LimiterScope::Auth => "auth",
        }
    }
}

impl std::fmt::Display for LimiterScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimiterScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(LimiterScope::Admin),
            "api" => Ok(LimiterScope::Api),
            "auth" => Ok(LimiterScope::Auth),
            _ => Err(()),
        }
    }
}

/// The pre-configured limiters, created once at startup.
///
/// All limiters share one [`LimiterStore`]; scoped keys keep their quotas
/// independent. The registry lives in an `Arc` held by the server state for
/// the life of the process.
pub struct LimiterRegistry {
    store: Arc<LimiterStore>,
    admin: RateLimiter,
    api: RateLimiter,
    auth: RateLimiter,
}

impl LimiterRegistry {
    /// Build the named limiters from configuration.
    pub fn new(limits: &LimitsConfig) -> Self {
        let store = Arc::new(LimiterStore::new());
        Self {
            admin: RateLimiter::new(
                LimiterScope::Admin.as_str(),
                limits.admin,
                Arc::clone(&store),
            ),
            api: RateLimiter::new(LimiterScope::Api.as_str(), limits.api, Arc::clone(&store)),
            auth: RateLimiter::new(LimiterScope::Auth.as_str(), limits.auth, Arc::clone(&store)),
            store,
        }
    }

    /// Select a limiter by purpose.
    pub fn get(&self, scope: LimiterScope) -> &RateLimiter {
        match scope {
            LimiterScope::Admin => &self.admin,
            LimiterScope::Api => &self.api,
            LimiterScope::Auth => &self.auth,
        }
    }

    /// Limiter for admin/moderation endpoints.
    pub fn admin(&self) -> &RateLimiter {
        &self.admin
    }

    /// Limiter for general API endpoints.
    pub fn api(&self) -> &RateLimiter {
        &self.api
    }

    /// Limiter for authentication endpoints.
    pub fn auth(&self) -> &RateLimiter {
        &self.auth
    }

    /// The shared window record store, for wiring the sweep task.
    pub fn store(&self) -> &Arc<LimiterStore> {
        &self.store
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}
