use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,
    #[serde(default = "default_smtp_from_name")]
    pub smtp_from_name: String,
    /// メール送信のタイムアウト（秒）。超過は送信失敗として扱う
    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,

    // OTP設定
    /// OTPの有効期間（秒）
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: i64,
    /// OTP再リクエストまでのクールダウン（秒）
    #[serde(default = "default_otp_cooldown_secs")]
    pub otp_cooldown_secs: i64,
    /// 期限切れOTP掃除の実行間隔（秒）
    #[serde(default = "default_otp_cleanup_interval_secs")]
    pub otp_cleanup_interval_secs: u64,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_FROM_NAME: &str = "Legal Case Management System";
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OTP_TTL_SECS: i64 = 600;
const DEFAULT_OTP_COOLDOWN_SECS: i64 = 120;
const DEFAULT_OTP_CLEANUP_INTERVAL_SECS: u64 = 300;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_from_name() -> String {
    DEFAULT_SMTP_FROM_NAME.to_string()
}

fn default_smtp_timeout_secs() -> u64 {
    DEFAULT_SMTP_TIMEOUT_SECS
}

fn default_otp_ttl_secs() -> i64 {
    DEFAULT_OTP_TTL_SECS
}

fn default_otp_cooldown_secs() -> i64 {
    DEFAULT_OTP_COOLDOWN_SECS
}

fn default_otp_cleanup_interval_secs() -> u64 {
    DEFAULT_OTP_CLEANUP_INTERVAL_SECS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
