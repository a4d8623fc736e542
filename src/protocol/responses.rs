//! FTP reply codes
//!
//! The session itself only looks at the leading digit of a reply. These
//! named codes and `format_response` are for code that plays the server
//! side, such as the integration test server.

pub const FILE_STATUS_OK: u16 = 150;
pub const OK: u16 = 200;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const CANNOT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const LOCAL_ERROR: u16 = 451;
pub const BAD_SEQUENCE: u16 = 503;
pub const AUTH_FAILED: u16 = 530;
pub const FILE_NOT_FOUND: u16 = 550;

/// Format a reply line as a server would send it
pub fn format_response(code: u16, message: &str) -> String {
    format!("{code} {message}\r\n")
}
