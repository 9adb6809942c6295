use folio_sync::{Admission, RateLimiter, RATE_LIMIT};
use std::net::{IpAddr, Ipv4Addr};

fn source(n: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
}

#[test]
fn messages_under_the_limit_are_admitted() {
    let limiter = RateLimiter::new();
    for _ in 0..RATE_LIMIT {
        assert_eq!(limiter.record_message(source(1)), Admission::Allowed);
    }
    assert!(!limiter.is_blocked(&source(1)));
}

#[test]
fn crossing_the_limit_blocks_but_admits_the_triggering_message() {
    let limiter = RateLimiter::new();
    for _ in 0..RATE_LIMIT {
        assert_eq!(limiter.record_message(source(2)), Admission::Allowed);
    }
    // The 101st message crosses the threshold: still admitted, but the
    // source is now blocked.
    assert_eq!(limiter.record_message(source(2)), Admission::Allowed);
    assert!(limiter.is_blocked(&source(2)));

    // The message after that closes the connection.
    assert_eq!(limiter.record_message(source(2)), Admission::Close);
}

#[test]
fn sources_are_counted_independently() {
    let limiter = RateLimiter::new();
    for _ in 0..=RATE_LIMIT {
        limiter.record_message(source(3));
    }
    assert!(limiter.is_blocked(&source(3)));
    assert_eq!(limiter.record_message(source(4)), Admission::Allowed);
    assert!(!limiter.is_blocked(&source(4)));
}

#[test]
fn reset_zeroes_counters_but_keeps_blocks() {
    let limiter = RateLimiter::new();
    for _ in 0..=RATE_LIMIT {
        limiter.record_message(source(5));
    }
    assert!(limiter.is_blocked(&source(5)));

    limiter.reset_counters();

    // Counter is back to zero, block survives the reset.
    assert!(limiter.is_blocked(&source(5)));
    assert_eq!(limiter.record_message(source(5)), Admission::Close);
}

#[test]
fn reset_lets_a_fast_but_unblocked_source_continue() {
    let limiter = RateLimiter::new();
    for _ in 0..RATE_LIMIT {
        limiter.record_message(source(6));
    }
    limiter.reset_counters();
    for _ in 0..RATE_LIMIT {
        assert_eq!(limiter.record_message(source(6)), Admission::Allowed);
    }
    assert!(!limiter.is_blocked(&source(6)));
}

#[test]
fn connects_count_against_the_same_window() {
    let limiter = RateLimiter::new();
    limiter.record_connect(source(7));
    for _ in 0..RATE_LIMIT {
        limiter.record_message(source(7));
    }
    // 1 connect + 100 messages = 101 > limit.
    assert!(limiter.is_blocked(&source(7)));
}

#[test]
fn unblock_is_administrative_and_resets_the_counter() {
    let limiter = RateLimiter::new();
    for _ in 0..=RATE_LIMIT {
        limiter.record_message(source(8));
    }
    assert!(limiter.is_blocked(&source(8)));

    assert!(limiter.unblock(&source(8)));
    assert!(!limiter.is_blocked(&source(8)));
    assert_eq!(limiter.record_message(source(8)), Admission::Allowed);

    // Unblocking an unknown or unblocked source reports false.
    assert!(!limiter.unblock(&source(8)));
    assert!(!limiter.unblock(&source(99)));
}

#[test]
fn snapshot_lists_every_seen_source() {
    let limiter = RateLimiter::new();
    limiter.record_message(source(10));
    limiter.record_message(source(11));

    let mut addrs: Vec<_> = limiter.snapshot().into_iter().map(|(a, _)| a).collect();
    addrs.sort();
    assert_eq!(addrs, vec![source(10), source(11)]);
}
