use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::models::OneTimePasscode;

#[derive(Clone)]
pub struct OtpRepository {
    pool: PgPool,
}

impl OtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 新しいOTPを発行する
    ///
    /// 同一アカウントの未使用OTPをすべて使用済みにしてから新規レコードを
    /// INSERT する。両方を1トランザクションで行うため、発行が並行しても
    /// アカウントあたり有効なOTPは常に高々1件になる。
    ///
    /// # Arguments
    /// * `account_id` - 対象アカウントのID
    /// * `email` - 発行時点のメールアドレス（レコードに固定される）
    /// * `code` - 6桁のコード
    /// * `ttl_secs` - 有効期間（秒）
    pub async fn create(
        &self,
        account_id: i64,
        email: &str,
        code: &str,
        ttl_secs: i64,
    ) -> Result<OneTimePasscode, sqlx::Error> {
        let created_at = OffsetDateTime::now_utc();
        let expires_at = created_at + Duration::seconds(ttl_secs);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE otps SET used = TRUE WHERE account_id = $1 AND used = FALSE")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        let otp = sqlx::query_as::<_, OneTimePasscode>(
            r#"
            INSERT INTO otps
                (account_id, email, code, created_at, expires_at, used, verified_at, attempt_count)
            VALUES ($1, $2, $3, $4, $5, FALSE, NULL, 0)
            RETURNING id, account_id, email, code, created_at, expires_at,
                      used, verified_at, attempt_count
            "#,
        )
        .bind(account_id)
        .bind(email)
        .bind(code)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(otp)
    }

    /// コードを検証する
    ///
    /// (email, code) に一致する最新のレコード1件だけを判定対象にする。
    /// - レコードなし → None（ペナルティなし）
    /// - 有効（未使用・期限内）→ used = TRUE / verified_at = NOW() にして返す
    /// - 無効（使用済み or 期限切れ）→ attempt_count を加算して None
    ///
    /// 正しいコードでも期限切れ後の提出は「無効なレコードへの試行」として
    /// 数える。判定と更新は1トランザクション。
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<OneTimePasscode>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_as::<_, OneTimePasscode>(
            r#"
            SELECT id, account_id, email, code, created_at, expires_at,
                   used, verified_at, attempt_count
            FROM otps
            WHERE email = $1 AND code = $2
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(otp) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();

        if otp.is_valid(now) {
            let verified = sqlx::query_as::<_, OneTimePasscode>(
                r#"
                UPDATE otps
                SET used = TRUE, verified_at = NOW()
                WHERE id = $1
                RETURNING id, account_id, email, code, created_at, expires_at,
                          used, verified_at, attempt_count
                "#,
            )
            .bind(otp.id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(Some(verified))
        } else {
            sqlx::query("UPDATE otps SET attempt_count = attempt_count + 1 WHERE id = $1")
                .bind(otp.id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(None)
        }
    }

    /// メールアドレスの最新OTPを取得（有効性は問わない）
    ///
    /// # Note
    /// レートリミット判定の読み取り専用。コード照合には使わないこと。
    pub async fn find_latest_by_email(
        &self,
        email: &str,
    ) -> Result<Option<OneTimePasscode>, sqlx::Error> {
        sqlx::query_as::<_, OneTimePasscode>(
            r#"
            SELECT id, account_id, email, code, created_at, expires_at,
                   used, verified_at, attempt_count
            FROM otps
            WHERE email = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// アカウントの未使用OTPをすべて使用済みにする
    ///
    /// # Returns
    /// 無効化された件数
    pub async fn invalidate_all(&self, account_id: i64) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE otps SET used = TRUE WHERE account_id = $1 AND used = FALSE")
                .bind(account_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// 期限切れOTPを削除する（使用済みかどうかは問わない）
    ///
    /// # Returns
    /// 削除された行数
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
