pub mod accounts;
pub mod health;
pub mod login;
pub mod otp;
pub mod password;

pub use accounts::{
    create_account, deactivate_account, get_account, list_accounts, lookup_account,
    reactivate_account, update_account,
};
pub use health::health_check;
pub use login::login;
pub use otp::{otp_cooldown, request_otp, verify_otp};
pub use password::{change_password, reset_password};
