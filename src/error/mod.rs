//! Error handling
//!
//! Defines error types for the FTP client.

pub mod types;

pub use types::*;
