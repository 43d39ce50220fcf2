use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::Config;
use crate::error::AppError;
use crate::models::Account;
use crate::repositories::{AccountRepository, NewAccount, OtpRepository};
use crate::services::EmailService;
use crate::services::password::{
    generate_otp_code, generate_random_password, generate_salt, hash_password, verify_password,
};

/// メールアドレスの形式チェック
///
/// local@domain.tld 形式。local は英数と ._%+- のみ、
/// domain はドットを含み、末尾ラベルは英字2文字以上。
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// OTPコードの形式チェック（6桁の数字）
pub fn is_valid_otp_format(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// クールダウンの残り秒数
///
/// 最後の発行時刻 + クールダウンまでの残り。経過済みなら 0。
fn remaining_cooldown(
    last_created_at: OffsetDateTime,
    cooldown_secs: i64,
    now: OffsetDateTime,
) -> i64 {
    let can_request_at = last_created_at + time::Duration::seconds(cooldown_secs);
    if now >= can_request_at {
        return 0;
    }
    (can_request_at - now).whole_seconds()
}

/// 認証サービス
///
/// アカウント・OTPの各リポジトリと通知ゲートウェイを束ねるオーケストレーター。
/// 自前の永続状態は持たない。依存はすべてコンストラクタで注入する。
#[derive(Clone)]
pub struct AuthService {
    accounts: AccountRepository,
    otps: OtpRepository,
    email_service: EmailService,
    config: Arc<Config>,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(
        accounts: AccountRepository,
        otps: OtpRepository,
        email_service: EmailService,
        config: Arc<Config>,
    ) -> Self {
        Self {
            accounts,
            otps,
            email_service,
            config,
        }
    }

    /// ユーザー名 + パスワードによる従来型ログイン
    ///
    /// 「ユーザー不在」「無効化済み」「パスワード不一致」はいずれも
    /// 同じ `InvalidCredentials` として返す（存在有無の漏洩防止）。
    /// 成功時は last_login を更新し、更新後のアカウントを返す。
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("ユーザー名は必須です".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AppError::Validation("パスワードは必須です".to_string()));
        }

        let account = match self.accounts.find_active_by_username(username).await? {
            Some(account) => account,
            None => {
                // タイミング攻撃対策: ユーザーが存在しない場合もダミーの検証を実行
                let dummy_salt = generate_salt();
                let _ = verify_password(password, &dummy_salt, "dummy");
                tracing::warn!(username = %username, "認証失敗: ユーザー不在または無効化済み");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_password(password, &account.password_salt, &account.password_hash) {
            tracing::warn!(username = %username, "認証失敗: パスワード不一致");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(username = %username, "認証成功");
        self.finish_login(account.id).await
    }

    /// OTPログインの開始（フェーズ1）
    ///
    /// アカウント不在・無効化済みは false を返すだけで、OTPの発行も
    /// メール送信も行わない。メール送信に失敗した場合は発行したばかりの
    /// OTPを無効化して false を返す（補償処理）。
    pub async fn initiate_otp_login(&self, email: &str) -> Result<bool, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::Validation(
                "有効なメールアドレスを入力してください".to_string(),
            ));
        }

        let account = match self.accounts.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(email = %email, "OTP発行失敗: ユーザー不在");
                return Ok(false);
            }
        };
        if !account.active {
            tracing::warn!(email = %email, "OTP発行失敗: アカウント無効化済み");
            return Ok(false);
        }

        // 発行（過去の未使用OTPは同一トランザクションで無効化される）
        let code = generate_otp_code();
        let otp = self
            .otps
            .create(account.id, &account.email, &code, self.config.otp_ttl_secs)
            .await?;

        tracing::info!(account_id = account.id, otp_id = otp.id, "OTP発行");

        // 配送。失敗したら発行したOTPを無効化してロールバック
        match self
            .email_service
            .send_otp(&account.email, &code, &account.full_name)
            .await
        {
            Ok(()) => {
                tracing::info!(account_id = account.id, "OTPメール送信完了");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "OTPメール送信失敗・発行分を無効化");
                self.otps.invalidate_all(account.id).await?;
                Ok(false)
            }
        }
    }

    /// OTPによる認証（フェーズ2）
    ///
    /// コードの検証と、アカウントが現在も有効かの確認は独立したチェック。
    /// 両方を通過した場合のみログイン成立とする。
    pub async fn authenticate_with_otp(&self, email: &str, code: &str) -> Result<Account, AppError> {
        let email = email.trim().to_lowercase();
        let code = code.trim();
        if !is_valid_otp_format(code) {
            return Err(AppError::Validation(
                "認証コードは6桁の数字で入力してください".to_string(),
            ));
        }

        let otp = match self.otps.verify(&email, code).await? {
            Some(otp) => otp,
            None => {
                tracing::warn!(email = %email, "OTP検証失敗");
                return Err(AppError::OtpInvalidOrExpired);
            }
        };

        // OTPが有効でも、アカウントが消えているか無効化済みなら拒否する
        let account = match self.accounts.find_by_id(otp.account_id).await? {
            Some(account) if account.active => account,
            _ => {
                tracing::warn!(account_id = otp.account_id, "OTP検証後: アカウント不在または無効化済み");
                return Err(AppError::AccountUnavailable);
            }
        };

        tracing::info!(account_id = account.id, "OTP認証成功");
        self.finish_login(account.id).await
    }

    /// 新しいOTPをリクエストできるか（レートリミット判定）
    ///
    /// # Note
    /// 判定と発行の間にロックはない（check-then-act）。同一クールダウン
    /// 窓内の並行リクエストは両方通過しうるが、発行側のトランザクションに
    /// より有効なOTPが2件残ることはない。仕様として許容している。
    pub async fn can_request_new_otp(&self, email: &str) -> Result<bool, AppError> {
        let email = email.trim().to_lowercase();
        match self.otps.find_latest_by_email(&email).await? {
            None => Ok(true),
            Some(latest) => {
                let remaining = remaining_cooldown(
                    latest.created_at,
                    self.config.otp_cooldown_secs,
                    OffsetDateTime::now_utc(),
                );
                Ok(remaining == 0)
            }
        }
    }

    /// 新しいOTPをリクエストできるまでの残り秒数
    pub async fn remaining_cooldown_seconds(&self, email: &str) -> Result<i64, AppError> {
        let email = email.trim().to_lowercase();
        match self.otps.find_latest_by_email(&email).await? {
            None => Ok(0),
            Some(latest) => Ok(remaining_cooldown(
                latest.created_at,
                self.config.otp_cooldown_secs,
                OffsetDateTime::now_utc(),
            )),
        }
    }

    /// パスワード変更
    ///
    /// 現在のパスワードを検証できた場合のみ、新しいソルト + ハッシュで
    /// 資格情報を丸ごと差し替える。不一致は false（エラーではない）。
    pub async fn change_password(
        &self,
        account_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, AppError> {
        let account = match self.accounts.find_by_id(account_id).await? {
            Some(account) => account,
            None => {
                tracing::warn!(account_id, "パスワード変更失敗: アカウント不在");
                return Ok(false);
            }
        };

        if !verify_password(current_password, &account.password_salt, &account.password_hash) {
            tracing::warn!(account_id, "パスワード変更失敗: 現在のパスワードが不一致");
            return Ok(false);
        }

        let salt = generate_salt();
        let hash = hash_password(new_password, &salt);
        self.accounts.set_credential(account_id, &salt, &hash).await?;

        tracing::info!(account_id, "パスワード変更完了");
        Ok(true)
    }

    /// パスワードリセット
    ///
    /// ランダムな仮パスワードを生成して資格情報を差し替え、メールで通知する。
    /// 戻り値の平文はこの呼び出しでしか取得できない（保存されるのはハッシュのみ）。
    ///
    /// # Note
    /// メール送信失敗はログに残すだけで処理は成立させる。資格情報は既に
    /// 差し替わっており、平文は戻り値として呼び出し側に渡るため。
    pub async fn reset_password(&self, email: &str) -> Result<Option<String>, AppError> {
        let email = email.trim();
        let account = match self.accounts.find_by_email(email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(email = %email, "パスワードリセット失敗: ユーザー不在");
                return Ok(None);
            }
        };

        let new_password = generate_random_password();
        let salt = generate_salt();
        let hash = hash_password(&new_password, &salt);
        self.accounts.set_credential(account.id, &salt, &hash).await?;

        if let Err(e) = self
            .email_service
            .send_password_reset(&account.email, &new_password, &account.full_name)
            .await
        {
            tracing::warn!(account_id = account.id, error = %e, "リセット通知メールの送信に失敗");
        }

        tracing::info!(account_id = account.id, "パスワードリセット完了");
        Ok(Some(new_password))
    }

    /// アカウントを無効化する
    ///
    /// 発行済みの未使用OTPはここでは失効させない。OTP検証（フェーズ2）の
    /// アカウント有効チェックが拒否を担う。
    pub async fn deactivate(&self, account_id: i64) -> Result<bool, AppError> {
        let updated = self.accounts.set_active(account_id, false).await?;
        if updated {
            tracing::info!(account_id, "アカウントを無効化");
        }
        Ok(updated)
    }

    /// アカウントを再有効化する
    pub async fn reactivate(&self, account_id: i64) -> Result<bool, AppError> {
        let updated = self.accounts.set_active(account_id, true).await?;
        if updated {
            tracing::info!(account_id, "アカウントを再有効化");
        }
        Ok(updated)
    }

    /// アカウントを作成する（管理操作）
    ///
    /// ソルト生成とハッシュ化を行い、アカウントと資格情報を同時に登録する。
    pub async fn create_account(
        &self,
        new_account: NewAccount,
        password: &str,
    ) -> Result<Account, AppError> {
        if self.accounts.username_exists(&new_account.username).await? {
            return Err(AppError::UsernameAlreadyExists);
        }

        let salt = generate_salt();
        let hash = hash_password(password, &salt);

        let account = self
            .accounts
            .create(&new_account, &salt, &hash)
            .await
            .map_err(|e| {
                // 事前チェックをすり抜けたUNIQUE制約違反（レース）もここで拾う
                if let sqlx::Error::Database(db_err) = &e {
                    match db_err.constraint() {
                        Some("accounts_username_key") => return AppError::UsernameAlreadyExists,
                        Some("accounts_email_key") => return AppError::EmailAlreadyExists,
                        _ => {}
                    }
                }
                AppError::Database(e)
            })?;

        tracing::info!(account_id = account.id, username = %account.username, "アカウント作成");
        Ok(account)
    }

    /// ログイン成立時の共通処理: last_login を更新し、更新後の状態を返す
    async fn finish_login(&self, account_id: i64) -> Result<Account, AppError> {
        self.accounts.update_last_login(account_id).await?;
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AppError::AccountUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_valid_email_formats() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("alice.smith+legal@firm.co.jp"));
        assert!(is_valid_email("a_b%c@sub.domain.org"));
    }

    #[test]
    fn test_invalid_email_formats() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice@example.c"));
        assert!(!is_valid_email("alice@exa mple.com"));
        assert!(!is_valid_email("alice@@example.com"));
        assert!(!is_valid_email("alice@example..com"));
        assert!(!is_valid_email("alice@example.c0m"));
    }

    #[test]
    fn test_otp_format_requires_exactly_6_digits() {
        assert!(is_valid_otp_format("123456"));
        assert!(is_valid_otp_format("000000"));
        assert!(!is_valid_otp_format("12345"));
        assert!(!is_valid_otp_format("1234567"));
        assert!(!is_valid_otp_format("12345a"));
        assert!(!is_valid_otp_format(""));
        assert!(!is_valid_otp_format("１２３４５６"));
    }

    #[test]
    fn test_cooldown_counts_down_from_issue_time() {
        let issued = OffsetDateTime::now_utc();
        // 発行直後はほぼ満額
        assert_eq!(remaining_cooldown(issued, 120, issued), 120);
        // 30秒経過で残り90秒
        assert_eq!(remaining_cooldown(issued, 120, issued + Duration::seconds(30)), 90);
    }

    #[test]
    fn test_cooldown_zero_after_window() {
        let issued = OffsetDateTime::now_utc();
        assert_eq!(
            remaining_cooldown(issued, 120, issued + Duration::seconds(120)),
            0
        );
        assert_eq!(
            remaining_cooldown(issued, 120, issued + Duration::minutes(10)),
            0
        );
    }
}
