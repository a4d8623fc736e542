//! Transfer module for the FTP client
//!
//! Handles data channel negotiation in passive and active mode and the
//! line and binary transfer codecs.

pub mod data_channel;
pub mod modes;

// Re-export key types and functions
pub use data_channel::{DataChannel, DataConnector, negotiate_active, negotiate_passive};
pub use modes::{Endpoint, TransferMode};
