use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// メール送信サービス（通知ゲートウェイ）
///
/// SMTP設定があり `email` フィーチャーが有効な場合は lettre で実際に送信する。
/// それ以外は開発モードとしてログ出力のみ行い、送信成功として扱う。
///
/// # Security
/// - 本文にはOTPコード・再発行パスワードが含まれる。
///   開発モード以外では本文をログに出力しないこと。
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// ログイン用OTPコードを送信する
    pub async fn send_otp(
        &self,
        to: &str,
        code: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        let subject = format!("ログイン認証コード - {}", self.config.smtp_from_name);
        let body = self.otp_body(code, display_name);
        self.deliver(to, &subject, &body).await
    }

    /// パスワードリセット通知（新しい仮パスワード入り）を送信する
    pub async fn send_password_reset(
        &self,
        to: &str,
        new_password: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        let subject = format!("パスワードリセット - {}", self.config.smtp_from_name);
        let body = self.password_reset_body(new_password, display_name);
        self.deliver(to, &subject, &body).await
    }

    fn otp_body(&self, code: &str, display_name: &str) -> String {
        let minutes = self.config.otp_ttl_secs / 60;
        format!(
            "{display_name} 様\n\n\
             ログイン用の認証コードは以下のとおりです。\n\n\
             {code}\n\n\
             このコードの有効期限は {minutes} 分です。1回のみ使用できます。\n\
             コードは誰にも教えないでください。\n\
             心当たりのない場合はこのメールを破棄し、管理者へ連絡してください。\n"
        )
    }

    fn password_reset_body(&self, new_password: &str, display_name: &str) -> String {
        format!(
            "{display_name} 様\n\n\
             パスワードがリセットされました。新しい仮パスワードは以下のとおりです。\n\n\
             {new_password}\n\n\
             ログイン後、すみやかにパスワードを変更してください。\n\
             心当たりのない場合は管理者へ連絡してください。\n"
        )
    }

    /// 実際の配送処理
    ///
    /// 送信失敗・タイムアウトは `AppError::Delivery` として返す。
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        if let Some(settings) = self.smtp_settings() {
            return self.deliver_smtp(settings, to, subject, body).await;
        }

        // 開発モード: 送信せずログ出力のみ
        tracing::info!(to = %to, subject = %subject, "メール送信（開発モード）");
        tracing::info!("本文:\n{}", body);
        Ok(())
    }

    #[cfg(feature = "email")]
    fn smtp_settings(&self) -> Option<SmtpSettings> {
        use secrecy::ExposeSecret;

        Some(SmtpSettings {
            host: self.config.smtp_host.clone()?,
            username: self.config.smtp_username.as_ref()?.expose_secret().clone(),
            password: self.config.smtp_password.as_ref()?.expose_secret().clone(),
            from_address: self.config.smtp_from_address.clone()?,
        })
    }

    #[cfg(feature = "email")]
    async fn deliver_smtp(
        &self,
        settings: SmtpSettings,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), AppError> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
            transport::smtp::authentication::Credentials,
        };

        let from = format!("{} <{}>", self.config.smtp_from_name, settings.from_address);
        let message = Message::builder()
            .from(from
                .parse()
                .map_err(|e| AppError::Delivery(format!("送信元アドレスが不正: {e}")))?)
            .to(to
                .parse()
                .map_err(|e| AppError::Delivery(format!("宛先アドレスが不正: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| AppError::Delivery(format!("メッセージ構築に失敗: {e}")))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| AppError::Delivery(format!("SMTPトランスポート初期化に失敗: {e}")))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(settings.username, settings.password))
            .build();

        // ゲートウェイの応答遅延はタイムアウトさせ、送信失敗として扱う
        let timeout = std::time::Duration::from_secs(self.config.smtp_timeout_secs);
        match tokio::time::timeout(timeout, mailer.send(message)).await {
            Ok(Ok(_)) => {
                tracing::info!(to = %to, "メール送信完了");
                Ok(())
            }
            Ok(Err(e)) => Err(AppError::Delivery(format!("SMTP送信エラー: {e}"))),
            Err(_) => Err(AppError::Delivery("SMTP送信タイムアウト".to_string())),
        }
    }
}

#[cfg(feature = "email")]
struct SmtpSettings {
    host: String,
    username: String,
    password: String,
    from_address: String,
}
