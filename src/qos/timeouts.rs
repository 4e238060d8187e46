//! Downstream timeout constraints.
//!
//! Configured values outside the valid range are substituted with the
//! default rather than rejected; a bad timeout must not take a route out of
//! service.

use std::time::Duration;

/// Lower bound, exclusive: 10 milliseconds.
pub const LOW_TIMEOUT_MS: u64 = 10;

/// Upper bound, exclusive: one day.
pub const HIGH_TIMEOUT_MS: u64 = 86_400_000;

/// Substituted when a configured value is out of range or absent: 30 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Apply the range constraint to a configured value.
pub fn clamp_timeout(ms: u64) -> u64 {
    if ms > LOW_TIMEOUT_MS && ms < HIGH_TIMEOUT_MS {
        ms
    } else {
        DEFAULT_TIMEOUT_MS
    }
}

/// Three-tier timeout resolution: route-level beats the global default,
/// which beats the built-in default.
pub fn resolve_timeout(route_ms: Option<u64>, global_ms: Option<u64>) -> Duration {
    let ms = route_ms
        .or(global_ms)
        .map(clamp_timeout)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_low_bound_replaced_by_default() {
        assert_eq!(clamp_timeout(5), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_in_range_accepted_unchanged() {
        assert_eq!(clamp_timeout(30_000), 30_000);
        assert_eq!(clamp_timeout(11), 11);
    }

    #[test]
    fn test_above_high_bound_replaced_by_default() {
        assert_eq!(clamp_timeout(HIGH_TIMEOUT_MS), DEFAULT_TIMEOUT_MS);
        assert_eq!(clamp_timeout(u64::MAX), DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_three_tier_fallback() {
        // Route-level wins.
        assert_eq!(
            resolve_timeout(Some(1_000), Some(2_000)),
            Duration::from_millis(1_000)
        );
        // Global default next.
        assert_eq!(
            resolve_timeout(None, Some(2_000)),
            Duration::from_millis(2_000)
        );
        // Built-in default last.
        assert_eq!(
            resolve_timeout(None, None),
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
        // An invalid route value falls to the default, not to the global.
        assert_eq!(
            resolve_timeout(Some(5), Some(2_000)),
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
    }
}
