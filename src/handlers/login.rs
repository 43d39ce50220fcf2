use axum::{Json, extract::State};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::Account;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザー名
    pub username: String,
    /// パスワード
    pub password: String,
}

/// ログインハンドラー（従来型: ユーザー名 + パスワード）
///
/// POST /api/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. 認証（DB照合、成功時は last_login 更新）
/// 3. アカウント情報を返却（資格情報フィールドはシリアライズ対象外）
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Account>, AppError> {
    validate_login_request(&request)?;

    let account = state
        .auth_service
        .authenticate(&request.username, &request.password)
        .await?;

    Ok(Json(account))
}

/// ログインリクエストのバリデーション
fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("ユーザー名は必須です".to_string()));
    }
    if request.password.trim().is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_username() {
        let request = LoginRequest {
            username: "".to_string(),
            password: "Passw0rd!1".to_string(),
        };
        assert!(validate_login_request(&request).is_err());
    }

    #[test]
    fn test_validate_whitespace_username() {
        let request = LoginRequest {
            username: "   ".to_string(),
            password: "Passw0rd!1".to_string(),
        };
        assert!(validate_login_request(&request).is_err());
    }

    #[test]
    fn test_validate_empty_password() {
        let request = LoginRequest {
            username: "alice".to_string(),
            password: "".to_string(),
        };
        assert!(validate_login_request(&request).is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let request = LoginRequest {
            username: "alice".to_string(),
            password: "Passw0rd!1".to_string(),
        };
        assert!(validate_login_request(&request).is_ok());
    }
}
