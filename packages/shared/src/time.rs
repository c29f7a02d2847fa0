//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock at the given Unix timestamp (milliseconds).
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_millis(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: utc_from_millis(fixed_time_millis).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Convert Unix milliseconds into a UTC instant, `None` when out of range.
pub fn utc_from_millis(timestamp_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(timestamp_millis).single()
}

/// Parse an RFC 3339 timestamp into UTC, `None` when malformed.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format an instant for display (RFC 3339, second precision).
pub fn format_rfc3339(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_returns_increasing_instants() {
        // テスト項目: SystemClock が呼び出すたびに単調増加する時刻を返す
        // given (前提条件):
        let clock = SystemClock;

        // when (操作):
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = clock.now();

        // then (期待する結果):
        assert!(second >= first);
    }

    #[test]
    fn test_fixed_clock_returns_fixed_instant() {
        // テスト項目: FixedClock が何度呼び出しても固定された時刻を返す
        // given (前提条件):
        let clock = FixedClock::from_millis(1_672_531_200_000);

        // when (操作):
        let first = clock.now();
        let second = clock.now();

        // then (期待する結果):
        assert_eq!(first, second);
        assert_eq!(first.timestamp_millis(), 1_672_531_200_000);
    }

    #[test]
    fn test_parse_rfc3339_normalizes_offset() {
        // テスト項目: オフセット付きの RFC 3339 文字列が UTC に正規化される
        // given (前提条件):
        let value = "2023-01-01T09:00:00+09:00";

        // when (操作):
        let parsed = parse_rfc3339(value);

        // then (期待する結果):
        assert_eq!(parsed, utc_from_millis(1_672_531_200_000));
    }

    #[test]
    fn test_parse_rfc3339_rejects_garbage() {
        // テスト項目: 不正な文字列は None になる
        // given (前提条件):
        let value = "yesterday";

        // when (操作):
        let parsed = parse_rfc3339(value);

        // then (期待する結果):
        assert!(parsed.is_none());
    }

    #[test]
    fn test_format_rfc3339_uses_zulu_suffix() {
        // テスト項目: 表示用フォーマットが Z サフィックス付きの秒精度になる
        // given (前提条件):
        let instant = utc_from_millis(1_672_531_200_123).unwrap();

        // when (操作):
        let formatted = format_rfc3339(&instant);

        // then (期待する結果):
        assert_eq!(formatted, "2023-01-01T00:00:00Z");
    }
}
