//! Delay computation for one retry attempt.

use crate::config::{BackoffStrategy, RetryRule};
use rand::Rng;
use std::time::Duration;

/// Delay before re-attempt `attempt` (0-indexed: the delay after the first
/// failure is attempt 0).
///
/// Strategy value plus uniform jitter in `[0, jitter]`, capped at the rule's
/// `max_delay` when one is set.
pub(crate) fn delay_for(rule: &RetryRule, attempt: u32) -> Duration {
    let base = rule.delay;
    let raw = match rule.strategy {
        BackoffStrategy::Immediate => Duration::ZERO,
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Exponential => base
            .checked_mul(2u32.saturating_pow(attempt.min(31)))
            .unwrap_or(Duration::MAX),
        BackoffStrategy::Fibonacci => base
            .checked_mul(fibonacci(attempt + 1))
            .unwrap_or(Duration::MAX),
        BackoffStrategy::Random => base.mul_f64(rand::rng().random_range(0.0..2.0)),
    };

    let jitter = if rule.jitter.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::rng().random_range(0..=rule.jitter.as_millis() as u64))
    };

    let total = raw.saturating_add(jitter);
    match rule.max_delay {
        Some(cap) => total.min(cap),
        None => total,
    }
}

/// fib(1) = fib(2) = 1, saturating at u32::MAX.
fn fibonacci(n: u32) -> u32 {
    let (mut a, mut b) = (0u32, 1u32);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}
