use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::{AccountRepository, OtpRepository};
use crate::services::{AuthService, EmailService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
/// サービスの依存はすべてここで組み立てる（プロセス全体のシングルトンは作らない）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// アカウントリポジトリ
    pub account_repo: AccountRepository,
    /// OTPリポジトリ
    pub otp_repo: OtpRepository,
    /// メールサービス
    pub email_service: EmailService,
    /// 認証サービス
    pub auth_service: AuthService,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let account_repo = AccountRepository::new(db_pool.clone());
        let otp_repo = OtpRepository::new(db_pool.clone());
        let email_service = EmailService::new(config.clone());
        let auth_service = AuthService::new(
            account_repo.clone(),
            otp_repo.clone(),
            email_service.clone(),
            config.clone(),
        );

        Self {
            db_pool,
            config,
            account_repo,
            otp_repo,
            email_service,
            auth_service,
        }
    }
}
