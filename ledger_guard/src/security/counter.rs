//! Fixed-window counter storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::errors::{RateLimitError, RateLimiterResult};

/// Atomic per-key counter for fixed windows
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter of `key` for the window starting at `window_start`
    /// and return the new value.
    ///
    /// A counter whose stored window is older than `window_start` starts over at 1.
    async fn increment_and_get(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> RateLimiterResult<u64>;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start: DateTime<Utc>,
    count: u64,
}

/// In-process counters for single-instance deployments
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, WindowCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window started before `cutoff`, returning how many were removed
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, c| c.window_start >= cutoff);
        before - counters.len()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.counters.lock().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_and_get(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> RateLimiterResult<u64> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert(WindowCounter {
            window_start,
            count: 0,
        });

        if window_start > counter.window_start {
            counter.window_start = window_start;
            counter.count = 0;
        }

        // A request carrying an older window start than the stored one is
        // counted against the current window.
        counter.count += 1;
        Ok(counter.count)
    }
}

/// Counters shared by every instance through PostgreSQL
#[derive(Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete counters whose window started before `cutoff`
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> RateLimiterResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_counters WHERE window_start < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment_and_get(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> RateLimiterResult<u64> {
        let row = sqlx::query(
            r#"
            INSERT INTO rate_limit_counters (key, window_start, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE SET
                count = CASE
                    WHEN rate_limit_counters.window_start < EXCLUDED.window_start THEN 1
                    ELSE rate_limit_counters.count + 1
                END,
                window_start = GREATEST(rate_limit_counters.window_start, EXCLUDED.window_start)
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        u64::try_from(count).map_err(|_| RateLimitError::CorruptCounter {
            key: key.to_string(),
            value: count,
        })
    }
}
