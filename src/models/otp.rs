use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// ワンタイムパスコード（OTP）
///
/// コード自体はレスポンスに含めない（メールでのみユーザーに届く）。
/// email は発行時点のアカウントのメールアドレスを保持する —
/// その後アカウントが編集されても追従しない。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OneTimePasscode {
    pub id: i64,
    pub account_id: i64,
    pub email: String,
    #[serde(skip)]
    pub code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub used: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    /// 無効なレコードへの検証試行のたびに加算される
    pub attempt_count: i32,
}

impl OneTimePasscode {
    /// 期限切れかどうか
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// 検証に使える状態かどうか（未使用かつ期限内）
    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        !self.used && !self.is_expired(now)
    }

    /// 失効までの残り秒数（失効済みなら 0）
    pub fn remaining_seconds(&self, now: OffsetDateTime) -> i64 {
        if now >= self.expires_at {
            return 0;
        }
        (self.expires_at - now).whole_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn passcode(created_at: OffsetDateTime, ttl_secs: i64, used: bool) -> OneTimePasscode {
        OneTimePasscode {
            id: 1,
            account_id: 10,
            email: "alice@example.com".to_string(),
            code: "123456".to_string(),
            created_at,
            expires_at: created_at + Duration::seconds(ttl_secs),
            used,
            verified_at: None,
            attempt_count: 0,
        }
    }

    #[test]
    fn test_fresh_passcode_is_valid() {
        let now = OffsetDateTime::now_utc();
        let otp = passcode(now, 600, false);
        assert!(otp.is_valid(now));
        assert!(!otp.is_expired(now));
    }

    #[test]
    fn test_expired_passcode_is_invalid() {
        let now = OffsetDateTime::now_utc();
        let otp = passcode(now - Duration::minutes(11), 600, false);
        assert!(otp.is_expired(now));
        assert!(!otp.is_valid(now));
    }

    #[test]
    fn test_used_passcode_is_invalid_even_before_expiry() {
        let now = OffsetDateTime::now_utc();
        let otp = passcode(now, 600, true);
        assert!(!otp.is_expired(now));
        assert!(!otp.is_valid(now));
    }

    #[test]
    fn test_remaining_seconds_counts_down() {
        let now = OffsetDateTime::now_utc();
        let otp = passcode(now - Duration::seconds(400), 600, false);
        assert_eq!(otp.remaining_seconds(now), 200);
    }

    #[test]
    fn test_remaining_seconds_is_zero_after_expiry() {
        let now = OffsetDateTime::now_utc();
        let otp = passcode(now - Duration::seconds(700), 600, false);
        assert_eq!(otp.remaining_seconds(now), 0);
    }
}
