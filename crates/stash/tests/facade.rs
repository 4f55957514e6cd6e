// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the `Stash` facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stash::{Error, Stash, StashDriver};
use stash_driver::Clock;
use stash_driver::testing::{DriverOp, MockDriver};
use stash_memory::InMemoryDriver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Report {
    city: String,
    temperature: i32,
}

fn report() -> Report {
    Report {
        city: "oslo".to_owned(),
        temperature: 12,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("upstream unavailable")]
struct UpstreamError;

/// Polls `condition` until it holds or a second passes.
async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn miss_computes_and_caches_once() {
    let stash = Stash::with_driver("weather", MockDriver::new());
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        let value = stash
            .wrap("oslo", "in 1 hour", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                report()
            })
            .await
            .expect("wrap failed");
        assert_eq!(value, report());
    }

    // Only the first call ran the computation.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(stash.driver().set_count("weather~oslo"), 1);
}

#[tokio::test]
async fn keys_are_namespaced_under_the_base_key() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());

    stash.set("oslo", "in 1 hour", report()).await.expect("set failed");

    assert!(driver.contains_key("weather~oslo"));
    assert!(!driver.contains_key("oslo"));
}

#[tokio::test]
async fn stashes_with_different_base_keys_do_not_collide() {
    let driver = MockDriver::new();
    let weather = Stash::with_driver("weather", driver.clone());
    let prices = Stash::with_driver("prices", driver);

    weather.set("oslo", "in 1 hour", 1).await.expect("set failed");
    prices.set("oslo", "in 1 hour", 2).await.expect("set failed");

    let value = weather.get::<i32>("oslo", "in 1 hour").await.expect("get failed");
    assert_eq!(value, Some(1));
    let value = prices.get::<i32>("oslo", "in 1 hour").await.expect("get failed");
    assert_eq!(value, Some(2));
}

#[tokio::test]
async fn changing_the_duration_phrase_recomputes() {
    let stash = Stash::with_driver("weather", MockDriver::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let producer = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            report()
        }
    };

    stash.wrap("oslo", "in 1 hour", producer(&calls)).await.expect("wrap failed");
    stash.wrap("oslo", "in 1 hour", producer(&calls)).await.expect("wrap failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A deploy changes the phrase at the call site: instant cache bust.
    stash.wrap("oslo", "in 2 hours", producer(&calls)).await.expect("wrap failed");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_in_grace_serves_immediately_and_refreshes_once() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    stash.set("oslo", "in 1 hour", report()).await.expect("set failed");
    driver.mark_stale("weather~oslo");

    let refreshed = Report {
        city: "oslo".to_owned(),
        temperature: -3,
    };
    let value = {
        let calls = Arc::clone(&calls);
        let refreshed = refreshed.clone();
        stash
            .wrap("oslo", "in 1 hour", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                refreshed
            })
            .await
            .expect("wrap failed")
    };

    // The caller got the stale value without waiting for the refresh.
    assert_eq!(value, report());

    // Exactly one background refresh lands.
    assert!(eventually(|| driver.set_count("weather~oslo") == 2).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The refreshed value is served fresh from now on.
    let value = stash.get::<Report>("oslo", "in 1 hour").await.expect("get failed");
    assert_eq!(value, Some(refreshed));
}

#[tokio::test]
async fn concurrent_stale_reads_all_serve_stale_with_bounded_refreshes() {
    const READERS: usize = 8;

    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());
    let refreshes = Arc::new(AtomicUsize::new(0));

    stash.set("oslo", "in 1 hour", 1).await.expect("set failed");
    driver.mark_stale("weather~oslo");

    // A herd of readers hits the stale entry before any refresh lands.
    let wraps = (0..READERS).map(|_| {
        let refreshes = Arc::clone(&refreshes);
        stash.wrap("oslo", "in 1 hour", move || async move {
            refreshes.fetch_add(1, Ordering::SeqCst);
            2
        })
    });
    for value in futures::future::join_all(wraps).await {
        // Every reader is served the stale value immediately, none errors.
        assert_eq!(value.expect("wrap failed"), 1);
    }

    // Refreshes are not deduplicated, but they are bounded: at least one
    // lands and at most one per reader, on top of the initial write.
    assert!(eventually(|| driver.set_count("weather~oslo") >= 2).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let sets = driver.set_count("weather~oslo");
    assert!((2..=READERS + 1).contains(&sets), "unexpected refresh count: {}", sets - 1);
    assert!(refreshes.load(Ordering::SeqCst) <= READERS);

    // The refreshed value wins from here on.
    let value = stash.get::<i32>("oslo", "in 1 hour").await.expect("get failed");
    assert_eq!(value, Some(2));
}

#[tokio::test]
async fn failed_background_refresh_is_not_retried_and_stale_is_served() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());

    stash.set("oslo", "in 1 hour", report()).await.expect("set failed");
    driver.mark_stale("weather~oslo");

    let value = stash
        .try_wrap("oslo", "in 1 hour", || async { Err::<Report, _>(UpstreamError) })
        .await
        .expect("stale value should be served despite the failing refresh");
    assert_eq!(value, report());

    // The failure is swallowed in the background; nothing was written and
    // the stale entry is still there for the next reader.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(driver.set_count("weather~oslo"), 1);
    assert!(driver.contains_key("weather~oslo"));
}

#[tokio::test]
async fn producer_failure_on_miss_propagates_and_caches_nothing() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());

    let err = stash
        .try_wrap("oslo", "in 1 hour", || async { Err::<Report, _>(UpstreamError) })
        .await
        .expect_err("producer failure must propagate");
    assert!(matches!(err, Error::Producer { .. }));
    assert!(!driver.contains_key("weather~oslo"));

    // A later successful call computes normally.
    let value = stash
        .try_wrap("oslo", "in 1 hour", || async { Ok::<_, UpstreamError>(report()) })
        .await
        .expect("wrap failed");
    assert_eq!(value, report());
}

#[tokio::test]
async fn backend_get_failure_propagates() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());

    driver.fail_when(|op| matches!(op, DriverOp::Get { .. }));

    let err = stash
        .wrap("oslo", "in 1 hour", || async { report() })
        .await
        .expect_err("backend failure must propagate");
    assert!(matches!(err, Error::Backend(_)));
}

#[tokio::test]
async fn invalid_duration_fails_after_computing() {
    let stash = Stash::with_driver("weather", MockDriver::new());

    let err = stash
        .wrap("oslo", "not a real duration", || async { report() })
        .await
        .expect_err("unresolvable phrase must fail the write");
    assert!(matches!(err, Error::InvalidDuration { .. }));
}

#[tokio::test]
async fn delete_clears_the_entry_and_is_idempotent() {
    let stash = Stash::with_driver("weather", MockDriver::new());
    let calls = Arc::new(AtomicUsize::new(0));

    stash.set("oslo", "in 1 hour", report()).await.expect("set failed");
    stash.delete("oslo").await.expect("delete failed");
    stash.delete("oslo").await.expect("delete should be idempotent");

    let calls_in_wrap = Arc::clone(&calls);
    stash
        .wrap("oslo", "in 1 hour", move || async move {
            calls_in_wrap.fetch_add(1, Ordering::SeqCst);
            report()
        })
        .await
        .expect("wrap failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clear_removes_everything_behind_the_driver() {
    let driver = MockDriver::new();
    let stash = Stash::with_driver("weather", driver.clone());

    stash.set("oslo", "in 1 hour", 1).await.expect("set failed");
    stash.set("bergen", "in 1 hour", 2).await.expect("set failed");
    stash.clear().await.expect("clear failed");

    assert_eq!(driver.len(), Some(0));
}

#[tokio::test]
async fn get_returns_none_for_a_miss_without_computing() {
    let stash = Stash::with_driver("weather", MockDriver::new());

    let value = stash.get::<Report>("oslo", "in 1 hour").await.expect("get failed");
    assert!(value.is_none());
}

// End-to-end over the real in-memory driver with a frozen clock.

#[tokio::test]
async fn hard_expiry_recomputes_through_the_memory_driver() {
    let clock = Clock::frozen();
    let driver = InMemoryDriver::builder()
        .grace_period(Duration::from_secs(300))
        .clock(clock.clone())
        .build();
    let stash = Stash::with_driver("weather", driver);
    let calls = Arc::new(AtomicUsize::new(0));

    let producer = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            report()
        }
    };

    stash.wrap("oslo", "in 1 hour", producer(&calls)).await.expect("wrap failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Past expiry and past grace: a full recompute.
    clock.advance(Duration::from_secs(3600 + 300));
    stash.wrap("oslo", "in 1 hour", producer(&calls)).await.expect("wrap failed");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_in_grace_refreshes_through_the_memory_driver() {
    let clock = Clock::frozen();
    let driver = InMemoryDriver::builder()
        .grace_period(Duration::from_secs(300))
        .clock(clock.clone())
        .build();
    let stash = Stash::with_driver("weather", driver);

    stash.set("oslo", "in 1 hour", 1).await.expect("set failed");

    // Expired but within grace: the stale value comes back and the refresh
    // rewrites the entry with a new expiry.
    clock.advance(Duration::from_secs(3600 + 60));
    let value = stash.wrap("oslo", "in 1 hour", || async { 2 }).await.expect("wrap failed");
    assert_eq!(value, 1);

    // The refresh restarted the hour, so once it lands the entry reads
    // fresh again with the new value.
    let mut refreshed = false;
    for _ in 0..100 {
        if stash.get::<i32>("oslo", "in 1 hour").await.expect("get failed") == Some(2) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refreshed, "background refresh never landed");
}
