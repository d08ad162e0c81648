//! Requester-facing notifications (Telegram today; any chat platform behind the port).

pub mod port;
pub mod types;
