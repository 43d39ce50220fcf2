use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("認証エラー")]
    InvalidCredentials,

    #[error("認証コードが無効または期限切れです")]
    OtpInvalidOrExpired,

    #[error("アカウントが利用できません")]
    AccountUnavailable,

    #[error("メール送信エラー: {0}")]
    Delivery(String),

    #[error("このユーザー名は既に使用されています")]
    UsernameAlreadyExists,

    #[error("このメールアドレスは既に使用されています")]
    EmailAlreadyExists,

    #[error("対象が見つかりません")]
    NotFound,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // 「ユーザー不在」と「パスワード不一致」は同じ応答にする（列挙攻撃防止）
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "ユーザー名またはパスワードが正しくありません".to_string(),
            ),
            // 「未発行」「使用済み」「期限切れ」も呼び出し側からは区別できない
            Self::OtpInvalidOrExpired => (
                StatusCode::UNAUTHORIZED,
                "認証コードが正しくないか、有効期限が切れています".to_string(),
            ),
            Self::AccountUnavailable => {
                (StatusCode::UNAUTHORIZED, "認証に失敗しました".to_string())
            }
            Self::Delivery(detail) => {
                tracing::error!(detail = %detail, "メール送信エラー");
                (
                    StatusCode::BAD_GATEWAY,
                    "メールの送信に失敗しました".to_string(),
                )
            }
            Self::UsernameAlreadyExists => (
                StatusCode::CONFLICT,
                "このユーザー名は既に使用されています".to_string(),
            ),
            Self::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "このメールアドレスは既に使用されています".to_string(),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "対象が見つかりません".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_maps_to_401() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_otp_failure_maps_to_401() {
        let response = AppError::OtpInvalidOrExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let response = AppError::Validation("入力が不正です".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delivery_failure_maps_to_502() {
        let response = AppError::Delivery("smtp timeout".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_storage_failure_maps_to_500_not_404() {
        // 永続層の障害を「見つからない」に混同しないこと
        let response = AppError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
