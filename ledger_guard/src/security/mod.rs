//! Request throttling.
//!
//! Every request is counted against one of four budgets (see
//! [`RateLimitPolicy`]) in fixed, non-overlapping windows. Counters live in a
//! [`CounterStore`]: [`MemoryCounterStore`] for a single process or
//! [`PgCounterStore`] when several instances share one budget.
//!
//! ## Example
//!
//! ```no_run
//! use ledger_guard::security::{RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimiter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = RateLimiter::in_memory(RateLimitConfig::default());
//!     let key = RateLimitKey::anonymous("192.168.1.1");
//!
//!     let result = limiter.check(RateLimitPolicy::Auth, &key).await?;
//!     if result.is_allowed() {
//!         println!("Allowed, {} requests remaining", result.remaining().unwrap_or(0));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod counter;
pub mod errors;
pub mod rate_limiter;

pub use counter::{CounterStore, MemoryCounterStore, PgCounterStore};
pub use errors::{RateLimitError, RateLimiterResult};
pub use rate_limiter::{
    RateLimitBudget, RateLimitConfig, RateLimitKey, RateLimitPolicy, RateLimitResult, RateLimiter,
};
