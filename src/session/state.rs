//! Module `state`
//!
//! Session state machine. Every session operation is checked against the
//! current state before anything is written to the control channel.
//!
//! ```text
//! Disconnected --connect--> Connected --USER 3xx--> AwaitingPassword
//!                              |   ^                    |
//!                       USER 2xx   +---- PASS 4xx/5xx --+
//!                              v                        |
//!                           LoggedIn <----- PASS 2xx ---+
//!                            |    ^
//!               STOR/RETR 1xx    completion reply
//!                            v    |
//!                          Transferring
//! ```
//! `close` (or a fatal control channel failure) leads to `Closed` from anywhere.

use std::fmt;

use crate::error::SequenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    AwaitingPassword,
    LoggedIn,
    /// Data channel open, completion reply not consumed yet
    Transferring,
    Closed,
}

/// Operations subject to the state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    User,
    Pass,
    Noop,
    Transfer,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::User => "USER",
            Operation::Pass => "PASS",
            Operation::Noop => "NOOP",
            Operation::Transfer => "transfer",
        }
    }
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::AwaitingPassword => "awaiting password",
            SessionState::LoggedIn => "logged in",
            SessionState::Transferring => "transferring",
            SessionState::Closed => "closed",
        }
    }

    pub fn allows(self, operation: Operation) -> bool {
        use Operation::*;
        use SessionState::*;

        matches!(
            (self, operation),
            (Disconnected, Connect)
                | (Connected, User)
                | (AwaitingPassword, Pass)
                | (LoggedIn, User | Noop | Transfer)
        )
    }

    pub fn check(self, operation: Operation) -> Result<(), SequenceError> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(SequenceError {
                operation: operation.name(),
                state: self.name(),
            })
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
