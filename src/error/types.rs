//! Error types
//!
//! Defines the error taxonomy surfaced by the FTP client session.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::Reply;

/// Malformed control-channel reply
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("empty reply line")]
    EmptyLine,
    #[error("invalid reply code in line {0:?}")]
    InvalidCode(String),
    #[error("invalid separator after reply code in line {0:?}")]
    InvalidSeparator(String),
    #[error("reply line is not utf-8")]
    LineIsNotUtf8,
    #[error("multi-line reply {0} exceeded {1} lines")]
    TooManyLines(u16, usize),
    #[error("multi-line reply {0} has no terminating line")]
    Unterminated(u16),
}

/// Socket-level establishment failures
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed { addr: String, source: io::Error },
    #[error("timed out connecting to {0}")]
    ConnectTimedOut(String),
    #[error("greeting rejected: {0}")]
    GreetingRejected(Reply),
    #[error("bind data listener on {0} failed: {1}")]
    BindFailed(SocketAddr, io::Error),
    #[error("accept on data listener failed: {0}")]
    AcceptFailed(io::Error),
    #[error("no data connection on {0} before timeout")]
    AcceptTimedOut(SocketAddr),
}

/// Control channel failures. Fatal to the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("control connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for reply")]
    ReplyTimedOut,
    #[error("control channel i/o failed: {0}")]
    Io(io::Error),
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: Reply },
}

/// Caller issued an operation the session state does not allow
#[derive(Debug, Error)]
#[error("{operation} is not allowed while {state}")]
pub struct SequenceError {
    pub operation: &'static str,
    pub state: &'static str,
}

/// Data channel endpoint setup failures
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("data channel setup rejected: {0}")]
    Rejected(Reply),
    #[error("cannot decode endpoint from {0:?}")]
    UndecodableEndpoint(String),
    #[error("invalid data port {0}")]
    InvalidPort(u16),
    #[error("address {0} cannot be advertised with PORT")]
    UnsupportedAddress(String),
}

/// Transfer rejected by the server
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer refused before any data was sent: {0}")]
    Rejected(Reply),
    #[error("data transferred but server reported failure: {0}")]
    Incomplete(Reply),
}

/// General FTP client error that encompasses all error types
#[derive(Debug, Error)]
pub enum FtpClientError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] ReplyError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),
    #[error("authentication failed: {0}")]
    Authentication(Reply),
    #[error("negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl FtpClientError {
    /// Whether the control channel can no longer be trusted after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FtpClientError::MalformedReply(_)
                | FtpClientError::Protocol(
                    ProtocolError::ConnectionClosed
                        | ProtocolError::ReplyTimedOut
                        | ProtocolError::Io(_)
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, FtpClientError>;
