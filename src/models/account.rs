use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// アカウントのロール
///
/// DB上は Postgres の enum 型 `account_role` として保存される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role")]
pub enum Role {
    Admin,
    Attorney,
    Staff,
    Finance,
    ReadOnly,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "Admin",
            Self::Attorney => "Attorney",
            Self::Staff => "Staff",
            Self::Finance => "Finance",
            Self::ReadOnly => "ReadOnly",
        };
        f.write_str(s)
    }
}

/// アカウント
///
/// username / email はそれぞれ一意。
/// password_hash / password_salt は資格情報としてレスポンスには含めない。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub registration_date: Date,
    /// 初回ログインまでは NULL
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub password_salt: String,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 案件情報の変更権限
    pub fn can_modify_cases(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Attorney | Role::Staff)
    }

    /// 財務情報の閲覧権限
    pub fn can_view_financials(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Finance | Role::Attorney)
    }

    /// 財務情報の変更権限
    pub fn can_modify_financials(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Finance)
    }

    /// アカウント管理権限
    pub fn can_manage_users(&self) -> bool {
        self.is_admin()
    }

    /// 表示用の名前（氏名 + ロール）
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.full_name, self.role)
    }

    /// 一度もログインしていないアカウントかどうか
    pub fn is_new_account(&self) -> bool {
        self.last_login.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn account_with_role(role: Role) -> Account {
        Account {
            id: 1,
            username: "tanaka".to_string(),
            email: "tanaka@example.com".to_string(),
            full_name: "Tanaka Taro".to_string(),
            role,
            active: true,
            registration_date: Date::from_calendar_date(2025, Month::January, 15).unwrap(),
            last_login: None,
            password_hash: String::new(),
            password_salt: String::new(),
        }
    }

    #[test]
    fn test_admin_permissions() {
        let account = account_with_role(Role::Admin);
        assert!(account.can_modify_cases());
        assert!(account.can_view_financials());
        assert!(account.can_modify_financials());
        assert!(account.can_manage_users());
    }

    #[test]
    fn test_readonly_has_no_write_permissions() {
        let account = account_with_role(Role::ReadOnly);
        assert!(!account.can_modify_cases());
        assert!(!account.can_view_financials());
        assert!(!account.can_modify_financials());
        assert!(!account.can_manage_users());
    }

    #[test]
    fn test_attorney_cannot_modify_financials() {
        let account = account_with_role(Role::Attorney);
        assert!(account.can_modify_cases());
        assert!(account.can_view_financials());
        assert!(!account.can_modify_financials());
    }

    #[test]
    fn test_display_name_includes_role() {
        let account = account_with_role(Role::Finance);
        assert_eq!(account.display_name(), "Tanaka Taro (Finance)");
    }

    #[test]
    fn test_serialization_omits_credential_fields() {
        let mut account = account_with_role(Role::Admin);
        account.password_hash = "hash".to_string();
        account.password_salt = "salt".to_string();
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_salt").is_none());
        assert_eq!(json.get("username").unwrap(), "tanaka");
    }

    #[test]
    fn test_new_account_until_first_login() {
        let mut account = account_with_role(Role::Staff);
        assert!(account.is_new_account());
        account.last_login = Some(OffsetDateTime::now_utc());
        assert!(!account.is_new_account());
    }
}
