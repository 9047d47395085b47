// src/downloader/retry.rs

use std::time::Duration;

/// 第 `attempt_index` 次重试（从 1 开始）前的等待时间: `unit * 2^attempt_index`。
/// 无抖动、无上限，溢出时饱和。
pub fn backoff_delay(attempt_index: u32, unit: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(attempt_index);
    unit.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let unit = Duration::from_secs(1);
        assert_eq!(backoff_delay(1, unit), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, unit), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, unit), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_scales_with_unit() {
        assert_eq!(
            backoff_delay(3, Duration::from_millis(10)),
            Duration::from_millis(80)
        );
        assert_eq!(backoff_delay(5, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates() {
        let delay = backoff_delay(64, Duration::from_secs(u64::MAX / 2));
        assert!(delay > Duration::from_secs(0));
    }
}
