use sqlx::PgPool;

use crate::models::{Account, Role};

/// アカウント作成時の入力
#[derive(Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// IDでアカウントを検索
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザー名でアカウントを検索
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザー名で有効なアカウントを検索（ログイン用）
    ///
    /// # Note
    /// 無効化済みアカウントは「存在しない」扱いになる。
    /// 呼び出し側はどちらのケースも同じ失敗として扱うこと。
    pub async fn find_active_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE username = $1 AND active = TRUE
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// メールアドレスでアカウントを検索
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザー名の重複チェック
    pub async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// 新しいアカウントを作成
    ///
    /// registration_date は当日、active は TRUE、last_login は NULL で登録する。
    ///
    /// # Errors
    /// - UNIQUE制約違反時: `sqlx::Error::Database`
    ///   (constraint = "accounts_username_key" / "accounts_email_key")
    ///   呼び出し側で重複エラーに変換すること
    pub async fn create(
        &self,
        new_account: &NewAccount,
        password_salt: &str,
        password_hash: &str,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts
                (username, email, full_name, role, active,
                 registration_date, last_login, password_hash, password_salt)
            VALUES ($1, $2, $3, $4, TRUE, CURRENT_DATE, NULL, $5, $6)
            RETURNING id, username, email, full_name, role, active,
                      registration_date, last_login, password_hash, password_salt
            "#,
        )
        .bind(&new_account.username)
        .bind(&new_account.email)
        .bind(&new_account.full_name)
        .bind(new_account.role)
        .bind(password_hash)
        .bind(password_salt)
        .fetch_one(&self.pool)
        .await
    }

    /// プロフィール項目を更新（資格情報は対象外）
    pub async fn update_profile(
        &self,
        id: i64,
        email: &str,
        full_name: &str,
        role: Role,
        active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET email = $2, full_name = $3, role = $4, active = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .bind(role)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 最終ログイン時刻を現在時刻に更新
    pub async fn update_last_login(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 資格情報（ソルト + ハッシュ）を丸ごと差し替える
    ///
    /// # Note
    /// ソルトとハッシュは必ずペアで更新する。片方だけの更新はしない。
    /// ハッシュ・ソルトはログに出力しないこと。
    pub async fn set_credential(
        &self,
        id: i64,
        password_salt: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE accounts SET password_hash = $2, password_salt = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(password_salt)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// active フラグの切り替え（無効化 / 再有効化）
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 有効なアカウントの一覧（ユーザー名順）
    pub async fn list_active(&self) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE active = TRUE
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// ロール指定で有効なアカウントの一覧（氏名順）
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, full_name, role, active,
                   registration_date, last_login, password_hash, password_salt
            FROM accounts
            WHERE role = $1 AND active = TRUE
            ORDER BY full_name
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
    }
}
