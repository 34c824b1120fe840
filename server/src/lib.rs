pub mod config;
pub mod server_state;
pub mod sms_endpoint;
pub mod twilio;
