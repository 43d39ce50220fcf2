pub mod account;
pub mod otp;

pub use account::{AccountRepository, NewAccount};
pub use otp::OtpRepository;
