use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Account;
use crate::services::auth::{is_valid_email, is_valid_otp_format};
use crate::state::AppState;

// === OTPリクエスト（フェーズ1） ===

#[derive(Debug, Deserialize)]
pub struct OtpRequestRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct OtpRequestResponse {
    /// 発行・送信まで完了したかどうか
    pub sent: bool,
    pub message: String,
}

/// OTP発行ハンドラー
///
/// POST /api/otp/request
///
/// アカウント不在・無効化済みでも sent = false を返すだけで、
/// 理由は応答に含めない。
pub async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequestRequest>,
) -> Result<Json<OtpRequestResponse>, AppError> {
    validate_email(&request.email)?;

    let sent = state.auth_service.initiate_otp_login(&request.email).await?;

    let message = if sent {
        "認証コードをメールで送信しました".to_string()
    } else {
        "認証コードを送信できませんでした".to_string()
    };

    Ok(Json(OtpRequestResponse { sent, message }))
}

// === OTP検証（フェーズ2） ===

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    /// 6桁の認証コード
    pub code: String,
}

/// OTP検証ハンドラー
///
/// POST /api/otp/verify
///
/// 成功時は last_login 更新済みのアカウントを返す。
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpVerifyRequest>,
) -> Result<Json<Account>, AppError> {
    validate_otp_verify_request(&request)?;

    let account = state
        .auth_service
        .authenticate_with_otp(&request.email, &request.code)
        .await?;

    Ok(Json(account))
}

// === クールダウン照会 ===

#[derive(Debug, Deserialize)]
pub struct CooldownParams {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CooldownResponse {
    pub can_request: bool,
    pub remaining_seconds: i64,
}

/// OTP再リクエスト可否の照会ハンドラー
///
/// GET /api/otp/cooldown?email=...
///
/// # Note
/// 参考値の読み取りのみ。この応答と実際の発行の間に
/// 別リクエストが割り込む可能性はある。
pub async fn otp_cooldown(
    State(state): State<AppState>,
    Query(params): Query<CooldownParams>,
) -> Result<Json<CooldownResponse>, AppError> {
    validate_email(&params.email)?;

    let can_request = state.auth_service.can_request_new_otp(&params.email).await?;
    let remaining_seconds = state
        .auth_service
        .remaining_cooldown_seconds(&params.email)
        .await?;

    Ok(Json(CooldownResponse {
        can_request,
        remaining_seconds,
    }))
}

/// メールアドレスのバリデーション
fn validate_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email.trim()) {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}

/// OTP検証リクエストのバリデーション
fn validate_otp_verify_request(request: &OtpVerifyRequest) -> Result<(), AppError> {
    validate_email(&request.email)?;
    if !is_valid_otp_format(request.code.trim()) {
        return Err(AppError::Validation(
            "認証コードは6桁の数字で入力してください".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_email() {
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_invalid_email() {
        assert!(validate_email("invalid-email").is_err());
    }

    #[test]
    fn test_validate_valid_email() {
        assert!(validate_email("alice@example.com").is_ok());
    }

    #[test]
    fn test_validate_verify_rejects_short_code() {
        let request = OtpVerifyRequest {
            email: "alice@example.com".to_string(),
            code: "12345".to_string(),
        };
        assert!(validate_otp_verify_request(&request).is_err());
    }

    #[test]
    fn test_validate_verify_rejects_non_numeric_code() {
        let request = OtpVerifyRequest {
            email: "alice@example.com".to_string(),
            code: "12a456".to_string(),
        };
        assert!(validate_otp_verify_request(&request).is_err());
    }

    #[test]
    fn test_validate_verify_valid_request() {
        let request = OtpVerifyRequest {
            email: "alice@example.com".to_string(),
            code: "123456".to_string(),
        };
        assert!(validate_otp_verify_request(&request).is_ok());
    }
}
