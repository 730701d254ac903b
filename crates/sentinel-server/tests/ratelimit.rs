use std::sync::Arc;
use std::time::Duration;

use sentinel_server::ratelimit::{RateDecision, RateLimitConfig, SlidingWindowLimiter};

fn limiter(requests: usize, window: Duration) -> SlidingWindowLimiter {
    SlidingWindowLimiter::new(RateLimitConfig {
        requests_per_window: requests,
        window,
    })
}

#[tokio::test]
async fn exactly_the_limit_wins_under_concurrency() {
    let limiter = Arc::new(limiter(5, Duration::from_secs(60)));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        tasks.push(tokio::spawn(async move { limiter.check("10.0.0.1") }));
    }

    let mut allowed = 0;
    for task in tasks {
        if task.await.unwrap() == RateDecision::Allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
}

#[test]
fn over_limit_reports_positive_retry_after() {
    let limiter = limiter(1, Duration::from_secs(60));

    assert_eq!(limiter.check("k"), RateDecision::Allowed);
    let second = limiter.check("k");
    assert!(matches!(second, RateDecision::Limited { .. }));
    assert!(second.retry_after_secs() >= 1);

    let RateDecision::Limited { retry_after } = second else {
        unreachable!();
    };
    assert!(retry_after <= Duration::from_secs(60));
}

#[test]
fn keys_are_independent() {
    let limiter = limiter(1, Duration::from_secs(60));

    assert_eq!(limiter.check("a"), RateDecision::Allowed);
    assert!(matches!(limiter.check("a"), RateDecision::Limited { .. }));
    assert_eq!(limiter.check("b"), RateDecision::Allowed);
}

#[test]
fn window_passing_frees_slots() {
    let limiter = limiter(1, Duration::from_millis(20));

    assert_eq!(limiter.check("k"), RateDecision::Allowed);
    assert!(matches!(limiter.check("k"), RateDecision::Limited { .. }));

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(limiter.check("k"), RateDecision::Allowed);
}

#[test]
fn sweep_retires_stale_windows() {
    let limiter = limiter(5, Duration::from_millis(20));

    limiter.check("a");
    limiter.check("b");
    assert_eq!(limiter.tracked_keys(), 2);

    std::thread::sleep(Duration::from_millis(30));
    limiter.sweep();
    assert_eq!(limiter.tracked_keys(), 0);
}
