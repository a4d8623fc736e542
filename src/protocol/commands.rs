//! Module `commands`
//!
//! Defines the FTP commands the client issues on the control channel
//! and their wire representation.

use std::fmt;

/// Representation type selected with `TYPE` before each transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// `TYPE A`, line-oriented text
    Ascii,
    /// `TYPE I`, raw bytes
    Image,
}

impl TransferType {
    pub fn code(&self) -> char {
        match self {
            TransferType::Ascii => 'A',
            TransferType::Image => 'I',
        }
    }
}

/// Represents an FTP command sent to the server.
///
/// Commands that carry arguments store them as `String` variants.
#[derive(Clone, PartialEq)]
pub enum Command {
    User(String),
    Pass(String),
    Noop,
    Type(TransferType),
    Pasv,
    Port(String), // h1,h2,h3,h4,p1,p2
    Stor(String),
    Retr(String),
    Quit,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::User(_) => "USER",
            Command::Pass(_) => "PASS",
            Command::Noop => "NOOP",
            Command::Type(_) => "TYPE",
            Command::Pasv => "PASV",
            Command::Port(_) => "PORT",
            Command::Stor(_) => "STOR",
            Command::Retr(_) => "RETR",
            Command::Quit => "QUIT",
        }
    }

    fn argument(&self) -> Option<&str> {
        match self {
            Command::User(arg)
            | Command::Pass(arg)
            | Command::Port(arg)
            | Command::Stor(arg)
            | Command::Retr(arg) => Some(arg),
            _ => None,
        }
    }

    /// Rejects arguments that would split the command across lines.
    pub fn is_well_formed(&self) -> bool {
        // an empty password is legal, e.g. for anonymous logins
        let may_be_empty = matches!(self, Command::Pass(_));
        self.argument().is_none_or(|arg| {
            (may_be_empty || !arg.is_empty()) && !arg.contains(['\r', '\n', '\0'])
        })
    }

    /// Wire form, including the line delimiter.
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Type(t) => write!(f, "TYPE {}", t.code()),
            _ => match self.argument() {
                Some(arg) => write!(f, "{} {}", self.verb(), arg),
                None => f.write_str(self.verb()),
            },
        }
    }
}

// Keeps passwords out of the logs
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(_) => f.write_str("PASS ****"),
            _ => write!(f, "{self}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(Command::User("hkhan".into()).to_line(), "USER hkhan\r\n");
        assert_eq!(Command::Noop.to_line(), "NOOP\r\n");
        assert_eq!(Command::Type(TransferType::Image).to_line(), "TYPE I\r\n");
        assert_eq!(
            Command::Port("127,0,0,1,4,1".into()).to_line(),
            "PORT 127,0,0,1,4,1\r\n"
        );
        assert_eq!(Command::Retr("main.txt".into()).to_string(), "RETR main.txt");
    }

    #[test]
    fn test_password_masked_in_debug() {
        let cmd = Command::Pass("secret".into());
        assert_eq!(format!("{cmd:?}"), "PASS ****");
        assert_eq!(cmd.to_string(), "PASS secret");
    }

    #[test]
    fn test_well_formed_arguments() {
        assert!(Command::Stor("main.txt".into()).is_well_formed());
        assert!(Command::Pasv.is_well_formed());
        assert!(!Command::Stor("".into()).is_well_formed());
        assert!(!Command::Retr("a\r\nDELE b".into()).is_well_formed());
    }

    #[test]
    fn test_empty_password_is_well_formed() {
        assert!(Command::Pass(String::new()).is_well_formed());
        assert_eq!(Command::Pass(String::new()).to_line(), "PASS \r\n");
        assert!(!Command::Pass("secret\r\nQUIT".into()).is_well_formed());
        assert!(!Command::User(String::new()).is_well_formed());
    }
}
