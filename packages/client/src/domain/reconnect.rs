//! Reconnection policy for the persistent connection.
//!
//! Pure functions without side effects, so the driver loop stays easy to test.

use std::time::Duration;

use super::error::TransportError;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_INTERVAL_SECS: u64 = 5;

/// How the connection driver retries a lost or failed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connect attempts tolerated before giving up
    pub max_attempts: u32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
        }
    }
}

/// Check if the driver should stop immediately based on the error type.
///
/// # Returns
///
/// `true` if the error is an authentication rejection, which retrying cannot fix
pub fn should_stop_immediately(error: &TransportError) -> bool {
    matches!(error, TransportError::Rejected(_))
}

/// Check if the driver should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The transport error that occurred
/// * `failed_attempts` - Consecutive failed connect attempts so far
/// * `max_attempts` - The maximum number of failed attempts allowed
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(
    error: &TransportError,
    failed_attempts: u32,
    max_attempts: u32,
) -> bool {
    if should_stop_immediately(error) {
        return false;
    }

    failed_attempts < max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_stop_immediately_with_rejection() {
        // テスト項目: 認証拒否の場合、即座に停止すべきと判定される
        // given (前提条件):
        let error = TransportError::Rejected("401 Unauthorized".to_string());

        // when (操作):
        let result = should_stop_immediately(&error);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_stop_immediately_with_connection_error() {
        // テスト項目: 接続エラーの場合、即座に停止すべきではないと判定される
        // given (前提条件):
        let error = TransportError::Connect("network error".to_string());

        // when (操作):
        let result = should_stop_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_with_rejection() {
        // テスト項目: 認証拒否の場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = TransportError::Rejected("403 Forbidden".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_after_link_closed() {
        // テスト項目: 確立済みの接続が切れた直後は再接続すべきと判定される
        // given (前提条件):
        let error = TransportError::Closed;

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 失敗回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let error = TransportError::Connect("network error".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 4, 5);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_at_limit() {
        // テスト項目: 失敗回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = TransportError::Connect("network error".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 5, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_default_policy_matches_constants() {
        // テスト項目: デフォルトのポリシーが定数と一致する
        // given (前提条件):

        // when (操作):
        let policy = ReconnectPolicy::default();

        // then (期待する結果):
        assert_eq!(policy.max_attempts, MAX_RECONNECT_ATTEMPTS);
        assert_eq!(policy.interval, Duration::from_secs(RECONNECT_INTERVAL_SECS));
    }
}
