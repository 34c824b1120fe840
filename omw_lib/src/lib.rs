pub mod position;
pub mod profile;
pub mod route;
pub mod sms;
