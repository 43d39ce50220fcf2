use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::auth::is_valid_email;
use crate::state::AppState;

// === パスワード変更 ===

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub account_id: i64,
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub changed: bool,
    pub message: String,
}

/// パスワード変更ハンドラー
///
/// POST /api/password/change
///
/// # Security
/// - 現在・新規いずれのパスワードもログに出力しない
/// - 現在のパスワード不一致はエラーではなく changed = false
pub async fn change_password(
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    validate_change_password_request(&request)?;

    let changed = state
        .auth_service
        .change_password(
            request.account_id,
            &request.current_password,
            &request.new_password,
        )
        .await?;

    let message = if changed {
        "パスワードが更新されました".to_string()
    } else {
        "パスワードを変更できませんでした".to_string()
    };

    Ok(Json(ChangePasswordResponse { changed, message }))
}

// === パスワードリセット ===

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    /// 生成された仮パスワード。この応答でのみ取得できる
    /// （保存されるのはハッシュのみで、再取得の手段はない）。
    pub new_password: String,
}

/// パスワードリセットハンドラー
///
/// POST /api/password/reset
///
/// 新しい仮パスワードを生成して資格情報を差し替え、メールでも通知する。
/// バックオフィスの管理操作を想定した口であり、平文は応答で一度だけ返す。
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AppError> {
    validate_reset_password_request(&request)?;

    let new_password = state
        .auth_service
        .reset_password(&request.email)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(ResetPasswordResponse { new_password }))
}

/// パスワード変更リクエストのバリデーション
fn validate_change_password_request(request: &ChangePasswordRequest) -> Result<(), AppError> {
    if request.current_password.trim().is_empty() {
        return Err(AppError::Validation(
            "現在のパスワードは必須です".to_string(),
        ));
    }
    if request.new_password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }
    Ok(())
}

/// リセットリクエストのバリデーション
fn validate_reset_password_request(request: &ResetPasswordRequest) -> Result<(), AppError> {
    if !is_valid_email(request.email.trim()) {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_current_password() {
        let request = ChangePasswordRequest {
            account_id: 1,
            current_password: "".to_string(),
            new_password: "NewPassw0rd!".to_string(),
        };
        assert!(validate_change_password_request(&request).is_err());
    }

    #[test]
    fn test_validate_short_new_password() {
        let request = ChangePasswordRequest {
            account_id: 1,
            current_password: "Passw0rd!1".to_string(),
            new_password: "short".to_string(),
        };
        assert!(validate_change_password_request(&request).is_err());
    }

    #[test]
    fn test_validate_valid_change_request() {
        let request = ChangePasswordRequest {
            account_id: 1,
            current_password: "Passw0rd!1".to_string(),
            new_password: "NewPassw0rd!".to_string(),
        };
        assert!(validate_change_password_request(&request).is_ok());
    }

    #[test]
    fn test_validate_reset_rejects_invalid_email() {
        let request = ResetPasswordRequest {
            email: "not-an-email".to_string(),
        };
        assert!(validate_reset_password_request(&request).is_err());
    }

    #[test]
    fn test_validate_reset_valid_request() {
        let request = ResetPasswordRequest {
            email: "alice@example.com".to_string(),
        };
        assert!(validate_reset_password_request(&request).is_ok());
    }
}
