pub mod account;
pub mod otp;

pub use account::{Account, Role};
pub use otp::OneTimePasscode;
