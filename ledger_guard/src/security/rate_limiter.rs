//! Fixed-window rate limiting with per-operation budgets.

use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};

use super::{
    counter::{CounterStore, MemoryCounterStore},
    errors::{RateLimitError, RateLimiterResult},
};

/// Operation class a request is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPolicy {
    /// Login, registration, refresh and password reset
    Auth,
    /// Resource creation
    Create,
    /// Deletion and revocation
    Destructive,
    /// Expensive processing such as imports
    Heavy,
}

impl RateLimitPolicy {
    pub const ALL: [RateLimitPolicy; 4] = [
        RateLimitPolicy::Auth,
        RateLimitPolicy::Create,
        RateLimitPolicy::Destructive,
        RateLimitPolicy::Heavy,
    ];

    /// Stable name used in counter keys, logs and metrics
    pub fn name(self) -> &'static str {
        match self {
            RateLimitPolicy::Auth => "auth",
            RateLimitPolicy::Create => "create",
            RateLimitPolicy::Destructive => "destructive",
            RateLimitPolicy::Heavy => "heavy",
        }
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request budget for one operation class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBudget {
    /// Maximum requests allowed per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: u64,

    /// Message returned to rejected clients
    pub message: String,
}

impl RateLimitBudget {
    /// Budget for authentication endpoints
    pub fn auth() -> Self {
        Self {
            max_requests: 20,
            window_secs: 60,
            message: "Too many authentication attempts, please try again later".to_string(),
        }
    }

    /// Budget for create endpoints
    pub fn create() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            message: "Too many create requests, please slow down".to_string(),
        }
    }

    /// Budget for delete endpoints
    pub fn destructive() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            message: "Too many delete requests, please slow down".to_string(),
        }
    }

    /// Budget for heavy processing endpoints
    pub fn heavy() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
            message: "Too many processing requests, please wait before retrying".to_string(),
        }
    }

    fn window_len(&self) -> RateLimiterResult<i64> {
        match i64::try_from(self.window_secs) {
            Ok(window) if window > 0 => Ok(window),
            _ => Err(RateLimitError::InvalidBudget(format!(
                "window of {} seconds",
                self.window_secs
            ))),
        }
    }
}

/// Budgets for every operation class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub auth: RateLimitBudget,
    pub create: RateLimitBudget,
    pub destructive: RateLimitBudget,
    pub heavy: RateLimitBudget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: RateLimitBudget::auth(),
            create: RateLimitBudget::create(),
            destructive: RateLimitBudget::destructive(),
            heavy: RateLimitBudget::heavy(),
        }
    }
}

impl RateLimitConfig {
    pub fn budget(&self, policy: RateLimitPolicy) -> &RateLimitBudget {
        match policy {
            RateLimitPolicy::Auth => &self.auth,
            RateLimitPolicy::Create => &self.create,
            RateLimitPolicy::Destructive => &self.destructive,
            RateLimitPolicy::Heavy => &self.heavy,
        }
    }

    pub fn budget_mut(&mut self, policy: RateLimitPolicy) -> &mut RateLimitBudget {
        match policy {
            RateLimitPolicy::Auth => &mut self.auth,
            RateLimitPolicy::Create => &mut self.create,
            RateLimitPolicy::Destructive => &mut self.destructive,
            RateLimitPolicy::Heavy => &mut self.heavy,
        }
    }

    /// Reject budgets that could never admit a request
    pub fn validate(&self) -> RateLimiterResult<()> {
        for policy in RateLimitPolicy::ALL {
            let budget = self.budget(policy);
            if budget.max_requests == 0 {
                return Err(RateLimitError::InvalidBudget(format!(
                    "{policy} allows zero requests"
                )));
            }
            budget.window_len()?;
        }
        Ok(())
    }
}

/// Logical actor a counter belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Key for requests without an identity
    pub fn anonymous(ip: &str) -> Self {
        Self(ip.to_string())
    }

    /// Key for requests carrying a validated identity
    pub fn authenticated(ip: &str, user_id: i64) -> Self {
        Self(format!("{ip}:user:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed { remaining: u32 },

    /// Request is rejected until the current window ends
    Limited { retry_after: u64 },
}

impl RateLimitResult {
    /// Check if request is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining requests (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Get retry after seconds (if limited)
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RateLimitResult::Limited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Start of the fixed window containing `timestamp`
fn window_start(timestamp: i64, window: i64) -> i64 {
    timestamp - timestamp.rem_euclid(window)
}

/// Fixed-window rate limiter over a pluggable counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a rate limiter
    ///
    /// # Arguments
    ///
    /// * `store` - Counter backend shared by every request
    /// * `config` - Budgets per operation class
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Rate limiter with process-local counters
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()), config)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn budget(&self, policy: RateLimitPolicy) -> &RateLimitBudget {
        self.config.budget(policy)
    }

    /// Count a request from `key` against `policy` and decide whether it may proceed
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ledger_guard::security::{RateLimiter, RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimitResult};
    /// # async fn example(limiter: &RateLimiter) {
    /// let key = RateLimitKey::anonymous("192.168.1.1");
    /// match limiter.check(RateLimitPolicy::Auth, &key).await {
    ///     Ok(RateLimitResult::Allowed { remaining }) => {
    ///         println!("Request allowed, {} remaining", remaining);
    ///     }
    ///     Ok(RateLimitResult::Limited { retry_after }) => {
    ///         println!("Rate limited, retry after {} seconds", retry_after);
    ///     }
    ///     Err(e) => println!("Error: {}", e),
    /// }
    /// # }
    /// ```
    pub async fn check(
        &self,
        policy: RateLimitPolicy,
        key: &RateLimitKey,
    ) -> RateLimiterResult<RateLimitResult> {
        self.check_at(policy, key, Utc::now()).await
    }

    /// Same as [`RateLimiter::check`] with an explicit clock value
    pub async fn check_at(
        &self,
        policy: RateLimitPolicy,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> RateLimiterResult<RateLimitResult> {
        let budget = self.config.budget(policy);
        let window = budget.window_len()?;

        let timestamp = now.timestamp();
        let start = window_start(timestamp, window);
        let start_time = DateTime::<Utc>::from_timestamp(start, 0).ok_or_else(|| {
            RateLimitError::InvalidBudget(format!("window start {start} out of range"))
        })?;

        let counter_key = format!("{}:{}", policy.name(), key.as_str());
        let count = self.store.increment_and_get(&counter_key, start_time).await?;
        let max = u64::from(budget.max_requests);

        if count > max {
            let retry_after = (start + window - timestamp).max(1).unsigned_abs();
            log::debug!(
                "Rate limit hit: policy={} key={} count={} retry_after={}",
                policy,
                key.as_str(),
                count,
                retry_after
            );
            return Ok(RateLimitResult::Limited { retry_after });
        }

        let remaining = u32::try_from(max - count).unwrap_or(u32::MAX);
        Ok(RateLimitResult::Allowed { remaining })
    }
}
