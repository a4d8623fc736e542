//! FTP transfer modes
//!
//! Passive/active mode selection and the data endpoint codec used by
//! `PASV` replies and `PORT` arguments.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::NegotiationError;

/// FTP transfer modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Server listens, client connects
    #[default]
    Passive,
    /// Client listens, server connects
    Active,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Passive => f.write_str("passive"),
            TransferMode::Active => f.write_str("active"),
        }
    }
}

/// Address of the data connection for one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, NegotiationError> {
        if port == 0 {
            return Err(NegotiationError::InvalidPort(port));
        }
        Ok(Self {
            host: host.into(),
            port,
        })
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Result<Self, NegotiationError> {
        Self::new(addr.ip().to_string(), addr.port())
    }

    /// Decodes the endpoint from the text of a 227 reply.
    ///
    /// Accepts `(h1,h2,h3,h4,p1,p2)`, the same six numbers without
    /// parentheses, and the `(ip:port)` form some servers send.
    pub fn from_pasv_reply(text: &str) -> Result<Self, NegotiationError> {
        let undecodable = || NegotiationError::UndecodableEndpoint(text.to_string());

        let parenthesized = text.find('(').and_then(|start| {
            let inner = &text[start + 1..];
            inner.find(')').map(|end| &inner[..end])
        });
        let inner = match parenthesized {
            Some(inner) => inner,
            _ => text
                .split_whitespace()
                .find(|token| token.matches(',').count() == 5)
                .map(|token| token.trim_end_matches(['.', ';']))
                .ok_or_else(undecodable)?,
        };

        if let Ok(addr) = inner.trim().parse::<SocketAddr>() {
            return Self::from_socket_addr(addr);
        }

        let numbers = inner
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| undecodable())?;
        let [h1, h2, h3, h4, p1, p2] = numbers[..] else {
            return Err(undecodable());
        };

        let ip = Ipv4Addr::new(h1, h2, h3, h4);
        let port = (u16::from(p1) << 8) | u16::from(p2);
        Self::new(ip.to_string(), port)
    }

    /// Encodes the endpoint as a `PORT` argument. IPv4 only.
    pub fn to_port_argument(&self) -> Result<String, NegotiationError> {
        let ip = match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => ip,
            _ => return Err(NegotiationError::UnsupportedAddress(self.host.clone())),
        };
        let [h1, h2, h3, h4] = ip.octets();
        let [p1, p2] = self.port.to_be_bytes();
        Ok(format!("{h1},{h2},{h3},{h4},{p1},{p2}"))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, NegotiationError> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|_| NegotiationError::UndecodableEndpoint(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
