use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Account, Role};
use crate::repositories::NewAccount;
use crate::services::auth::is_valid_email;
use crate::state::AppState;

// === アカウント作成 ===

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password: String, // Deserialize後すぐハッシュ化するため SecretBox 不要
}

/// アカウント作成ハンドラー（管理操作）
///
/// POST /api/accounts
///
/// # Security
/// - パスワードはログに出力しない
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    validate_create_account_request(&request)?;

    let account = state
        .auth_service
        .create_account(
            NewAccount {
                username: request.username.trim().to_string(),
                email: request.email.trim().to_lowercase(),
                full_name: request.full_name.trim().to_string(),
                role: request.role,
            },
            &request.password,
        )
        .await?;

    Ok(Json(account))
}

// === アカウント更新 ===

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
}

/// アカウント更新ハンドラー（プロフィール項目のみ、資格情報は対象外）
///
/// PUT /api/accounts/{id}
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    validate_update_account_request(&request)?;

    let updated = state
        .account_repo
        .update_profile(
            id,
            &request.email.trim().to_lowercase(),
            request.full_name.trim(),
            request.role,
            request.active,
        )
        .await
        .map_err(|e| {
            // メールアドレスのUNIQUE制約違反チェック
            if let sqlx::Error::Database(db_err) = &e
                && db_err.constraint() == Some("accounts_email_key")
            {
                return AppError::EmailAlreadyExists;
            }
            AppError::Database(e)
        })?;
    if !updated {
        return Err(AppError::NotFound);
    }

    let account = state
        .account_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(account_id = id, "アカウント更新");

    Ok(Json(account))
}

// === 取得・一覧 ===

/// アカウント取得ハンドラー
///
/// GET /api/accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .account_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// アカウント検索ハンドラー（ユーザー名 or メールアドレス）
///
/// GET /api/accounts/lookup?username=...
/// GET /api/accounts/lookup?email=...
///
/// どちらか一方のみ指定できる。
pub async fn lookup_account(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Account>, AppError> {
    let account = match (&params.username, &params.email) {
        (Some(username), None) => state.account_repo.find_by_username(username.trim()).await?,
        (None, Some(email)) => {
            state
                .account_repo
                .find_by_email(&email.trim().to_lowercase())
                .await?
        }
        _ => {
            return Err(AppError::Validation(
                "username または email のどちらか一方を指定してください".to_string(),
            ));
        }
    };

    account.map(Json).ok_or(AppError::NotFound)
}

#[derive(Debug, Deserialize)]
pub struct ListAccountsParams {
    /// 指定時はそのロールの有効アカウントのみ
    pub role: Option<Role>,
}

/// アカウント一覧ハンドラー（有効アカウントのみ）
///
/// GET /api/accounts
/// GET /api/accounts?role=Attorney
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<ListAccountsParams>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = match params.role {
        Some(role) => state.account_repo.list_by_role(role).await?,
        None => state.account_repo.list_active().await?,
    };

    Ok(Json(accounts))
}

// === ライフサイクル ===

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub ok: bool,
}

/// アカウント無効化ハンドラー
///
/// POST /api/accounts/{id}/deactivate
///
/// 発行済みの未使用OTPは失効させない（OTP検証側の有効チェックで拒否される）。
pub async fn deactivate_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let ok = state.auth_service.deactivate(id).await?;
    if !ok {
        return Err(AppError::NotFound);
    }
    Ok(Json(LifecycleResponse { ok }))
}

/// アカウント再有効化ハンドラー
///
/// POST /api/accounts/{id}/reactivate
pub async fn reactivate_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LifecycleResponse>, AppError> {
    let ok = state.auth_service.reactivate(id).await?;
    if !ok {
        return Err(AppError::NotFound);
    }
    Ok(Json(LifecycleResponse { ok }))
}

/// アカウント作成リクエストのバリデーション
fn validate_create_account_request(request: &CreateAccountRequest) -> Result<(), AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("ユーザー名は必須です".to_string()));
    }
    if !is_valid_email(request.email.trim()) {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    if request.full_name.trim().is_empty() {
        return Err(AppError::Validation("氏名は必須です".to_string()));
    }
    if request.password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }
    Ok(())
}

/// アカウント更新リクエストのバリデーション
fn validate_update_account_request(request: &UpdateAccountRequest) -> Result<(), AppError> {
    if !is_valid_email(request.email.trim()) {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    if request.full_name.trim().is_empty() {
        return Err(AppError::Validation("氏名は必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create_request() -> CreateAccountRequest {
        CreateAccountRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: "Alice Smith".to_string(),
            role: Role::Attorney,
            password: "Passw0rd!1".to_string(),
        }
    }

    #[test]
    fn test_validate_create_empty_username() {
        let mut request = valid_create_request();
        request.username = "".to_string();
        assert!(validate_create_account_request(&request).is_err());
    }

    #[test]
    fn test_validate_create_invalid_email() {
        let mut request = valid_create_request();
        request.email = "not-an-email".to_string();
        assert!(validate_create_account_request(&request).is_err());
    }

    #[test]
    fn test_validate_create_empty_full_name() {
        let mut request = valid_create_request();
        request.full_name = "  ".to_string();
        assert!(validate_create_account_request(&request).is_err());
    }

    #[test]
    fn test_validate_create_short_password() {
        let mut request = valid_create_request();
        request.password = "short".to_string();
        assert!(validate_create_account_request(&request).is_err());
    }

    #[test]
    fn test_validate_create_valid_request() {
        assert!(validate_create_account_request(&valid_create_request()).is_ok());
    }

    #[test]
    fn test_validate_update_invalid_email() {
        let request = UpdateAccountRequest {
            email: "broken".to_string(),
            full_name: "Alice Smith".to_string(),
            role: Role::Staff,
            active: true,
        };
        assert!(validate_update_account_request(&request).is_err());
    }

    #[test]
    fn test_validate_update_valid_request() {
        let request = UpdateAccountRequest {
            email: "alice@example.com".to_string(),
            full_name: "Alice Smith".to_string(),
            role: Role::Staff,
            active: false,
        };
        assert!(validate_update_account_request(&request).is_ok());
    }
}
