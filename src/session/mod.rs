//! FTP client session
//!
//! Orchestrates the control and data channels behind the user-facing
//! operations, and tracks the session state machine.

pub mod core;
pub mod lines;
pub mod state;

pub use self::core::Session;
pub use lines::RetrieveLines;
pub use state::{Operation, SessionState};
