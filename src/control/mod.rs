//! Control connection management
//!
//! Handles the command/reply exchange with the FTP server.

pub mod channel;

pub use channel::{ControlChannel, read_reply_from};
