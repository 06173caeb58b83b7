//! Integration tests for rate limiting.

use chrono::{DateTime, Duration, Utc};
use ledger_guard::security::{
    CounterStore, MemoryCounterStore, RateLimitBudget, RateLimitConfig, RateLimitKey,
    RateLimitPolicy, RateLimitResult, RateLimiter,
};
use proptest::prelude::*;
use std::sync::Arc;

fn window_aligned(timestamp: i64, window: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp - timestamp.rem_euclid(window), 0).unwrap()
}

#[tokio::test]
async fn test_twenty_first_auth_attempt_is_limited() {
    let limiter = RateLimiter::in_memory(RateLimitConfig::default());
    let key = RateLimitKey::anonymous("203.0.113.7");
    let now = window_aligned(Utc::now().timestamp(), 60);

    for attempt in 1..=20 {
        let result = limiter
            .check_at(RateLimitPolicy::Auth, &key, now)
            .await
            .unwrap();
        assert!(result.is_allowed(), "Attempt {attempt} should pass");
    }

    let result = limiter
        .check_at(RateLimitPolicy::Auth, &key, now)
        .await
        .unwrap();
    assert_eq!(result, RateLimitResult::Limited { retry_after: 60 });
    assert_eq!(
        limiter.budget(RateLimitPolicy::Auth).message,
        "Too many authentication attempts, please try again later"
    );
}

#[tokio::test]
async fn test_limiters_sharing_a_store_share_budgets() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let mut config = RateLimitConfig::default();
    config.heavy = RateLimitBudget {
        max_requests: 2,
        window_secs: 60,
        message: "wait".to_string(),
    };

    let first = RateLimiter::new(store.clone(), config.clone());
    let second = RateLimiter::new(store, config);
    let key = RateLimitKey::authenticated("10.1.1.1", 9);
    let now = window_aligned(Utc::now().timestamp(), 60);

    first
        .check_at(RateLimitPolicy::Heavy, &key, now)
        .await
        .unwrap();
    second
        .check_at(RateLimitPolicy::Heavy, &key, now)
        .await
        .unwrap();

    assert!(
        !first
            .check_at(RateLimitPolicy::Heavy, &key, now + Duration::seconds(1))
            .await
            .unwrap()
            .is_allowed()
    );
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime")
}

proptest! {
    #[test]
    fn test_budget_admits_exactly_max(
        max in 1u32..40,
        window in 1u64..3600,
        extra in 1usize..10,
        offset in 0i64..3600,
    ) {
        let mut config = RateLimitConfig::default();
        config.create = RateLimitBudget {
            max_requests: max,
            window_secs: window,
            message: "slow down".to_string(),
        };
        let limiter = RateLimiter::in_memory(config);
        let key = RateLimitKey::anonymous("198.51.100.1");

        let window = window as i64;
        let start = window_aligned(1_700_000_000, window);
        let now = start + Duration::seconds(offset % window);

        let results: Vec<RateLimitResult> = runtime().block_on(async {
            let mut results = Vec::new();
            for _ in 0..(max as usize + extra) {
                results.push(limiter.check_at(RateLimitPolicy::Create, &key, now).await.unwrap());
            }
            results
        });

        let allowed = results.iter().filter(|r| r.is_allowed()).count();
        prop_assert_eq!(allowed, max as usize);

        for result in &results[max as usize..] {
            let retry_after = result.retry_after().unwrap();
            prop_assert!(retry_after >= 1);
            prop_assert!(retry_after as i64 <= window);
            prop_assert_eq!(retry_after as i64, window - (offset % window));
        }
    }
}
