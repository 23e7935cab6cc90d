//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay to wait before retry number `retry` (1-based), doubling from `base`
/// and capped at `max`. Retry 0 has no delay.
pub fn calculate_backoff(retry: u32, base: Duration, max: Duration) -> Duration {
    if retry == 0 || base.is_zero() {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(retry - 1);
    let capped = base.saturating_mul(factor).min(max);

    // Jitter of up to 10% keeps synchronized callers from retrying in lockstep.
    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);

        let b1 = calculate_backoff(1, base, max);
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = calculate_backoff(2, base, max);
        assert!(b2 >= Duration::from_millis(200) && b2 < Duration::from_millis(220));

        let capped = calculate_backoff(30, base, max);
        assert!(capped >= max && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_zero_base_disables_backoff() {
        assert_eq!(
            calculate_backoff(3, Duration::ZERO, Duration::from_secs(1)),
            Duration::ZERO
        );
    }
}
