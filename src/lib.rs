//! RAX FTP Client
//!
//! A small FTP client session engine: control-channel command/reply
//! handling, passive and active data channels, and line or binary
//! uploads and downloads.

pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transfer;

pub use config::ClientConfig;
pub use error::{FtpClientError, Result};
pub use protocol::Reply;
pub use session::{RetrieveLines, Session, SessionState};
pub use transfer::TransferMode;
