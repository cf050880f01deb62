pub mod client;
pub mod conversation;
pub mod message;
pub mod report_mailer;
pub mod window;
