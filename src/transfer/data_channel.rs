//! Module `data_channel`
//!
//! Negotiates the per-transfer data connection in passive or active mode
//! and provides the transfer codecs that run over it: CRLF-delimited text
//! lines and raw bytes. The codecs do not care how the connection was
//! established.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::control::ControlChannel;
use crate::error::{ConnectionError, NegotiationError, Result};
use crate::protocol::Command;
use crate::protocol::reply::trim_line_end;
use crate::transfer::{Endpoint, TransferMode};

const LINE_DELIMITER: &[u8] = b"\r\n";

enum Pending {
    Connected(TcpStream),
    Listening(TcpListener),
}

/// A negotiated data endpoint that has not carried any data yet.
///
/// In passive mode the connection is already open; in active mode the
/// listener waits for the server, which only connects after the transfer
/// command has been accepted.
pub struct DataConnector {
    endpoint: Endpoint,
    pending: Pending,
}

impl DataConnector {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> TransferMode {
        match self.pending {
            Pending::Connected(_) => TransferMode::Passive,
            Pending::Listening(_) => TransferMode::Active,
        }
    }

    /// Produces the data channel.
    ///
    /// Active mode waits at most `accept_timeout` for the server to connect.
    /// The listener is released whether or not a connection arrives.
    pub async fn establish(self, accept_timeout: Duration, buffer_size: usize) -> Result<DataChannel> {
        let stream = match self.pending {
            Pending::Connected(stream) => stream,
            Pending::Listening(listener) => {
                let local_addr = listener.local_addr()?;
                match timeout(accept_timeout, listener.accept()).await {
                    Ok(Ok((stream, peer_addr))) => {
                        info!("Data connection accepted from {} on {}", peer_addr, local_addr);
                        stream
                    }
                    Ok(Err(e)) => return Err(ConnectionError::AcceptFailed(e).into()),
                    Err(_) => {
                        warn!(
                            "No data connection on {} after {:?}, releasing listener",
                            local_addr, accept_timeout
                        );
                        return Err(ConnectionError::AcceptTimedOut(local_addr).into());
                    }
                }
            }
        };
        DataChannel::new(stream, buffer_size)
    }
}

/// Sends PASV, decodes the advertised endpoint and connects to it.
///
/// Unless `trust_server_address` is set, only the advertised port is used
/// and the host is taken from the control connection's peer.
pub async fn negotiate_passive(
    control: &mut ControlChannel,
    trust_server_address: bool,
    connect_timeout: Duration,
) -> Result<DataConnector> {
    let reply = control.send_command(&Command::Pasv).await?;
    if !reply.is_completion() {
        return Err(NegotiationError::Rejected(reply).into());
    }

    let advertised = Endpoint::from_pasv_reply(&reply.text())?;
    let endpoint = if trust_server_address {
        advertised
    } else {
        Endpoint::new(control.peer_addr().ip().to_string(), advertised.port)?
    };
    let addr = endpoint.socket_addr()?;

    let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(ConnectionError::ConnectFailed {
                addr: addr.to_string(),
                source,
            }
            .into());
        }
        Err(_) => return Err(ConnectionError::ConnectTimedOut(addr.to_string()).into()),
    };

    debug!("Passive data connection open to {}", endpoint);
    Ok(DataConnector {
        endpoint,
        pending: Pending::Connected(stream),
    })
}

/// Listens on `bind_addr` and advertises the bound address with PORT.
///
/// Port 0 in `bind_addr` picks an ephemeral port.
pub async fn negotiate_active(
    control: &mut ControlChannel,
    bind_addr: SocketAddr,
) -> Result<DataConnector> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ConnectionError::BindFailed(bind_addr, e))?;
    let endpoint = Endpoint::from_socket_addr(listener.local_addr()?)?;

    let reply = control
        .send_command(&Command::Port(endpoint.to_port_argument()?))
        .await?;
    if !reply.is_completion() {
        return Err(NegotiationError::Rejected(reply).into());
    }

    debug!("Active data listener ready on {}", endpoint);
    Ok(DataConnector {
        endpoint,
        pending: Pending::Listening(listener),
    })
}

/// An established data connection. Dropping it releases the socket.
pub struct DataChannel {
    stream: BufStream<TcpStream>,
    peer_addr: SocketAddr,
    line_buf: Vec<u8>,
}

impl DataChannel {
    pub fn new(stream: TcpStream, buffer_size: usize) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            stream: BufStream::with_capacity(buffer_size, buffer_size, stream),
            peer_addr,
            line_buf: Vec::with_capacity(256),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Writes every line followed by CRLF and flushes.
    pub async fn send_lines<I, S>(&mut self, lines: I) -> io::Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut written = 0u64;
        for line in lines {
            let line = line.as_ref().as_bytes();
            self.stream.write_all(line).await?;
            self.stream.write_all(LINE_DELIMITER).await?;
            written += (line.len() + LINE_DELIMITER.len()) as u64;
        }
        self.stream.flush().await?;
        Ok(written)
    }

    /// Copies `source` verbatim onto the connection.
    pub async fn send_binary<R>(&mut self, source: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let written = tokio::io::copy(source, &mut self.stream).await?;
        self.stream.flush().await?;
        Ok(written)
    }

    /// Reads the next text line, without its delimiter.
    ///
    /// Returns `None` once the peer has closed the connection. A final
    /// record without a delimiter is still returned.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.line_buf.clear();
        let n = self.stream.read_until(b'\n', &mut self.line_buf).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = trim_line_end(&self.line_buf);
        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Copies every byte until peer close into `sink`, then flushes it.
    pub async fn receive_binary<W>(&mut self, sink: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let received = tokio::io::copy_buf(&mut self.stream, sink).await?;
        sink.flush().await?;
        Ok(received)
    }

    /// Signals end of data to the peer and releases the socket.
    pub async fn close(mut self) -> io::Result<()> {
        let result = self.stream.shutdown().await;
        debug!("Data connection to {} closed", self.peer_addr);
        result
    }
}
