//! Module `channel`
//!
//! The control connection: sends one command line at a time and reads
//! exactly one complete reply for it.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::error::{ConnectionError, FtpClientError, ProtocolError, Result};
use crate::protocol::reply::trim_line_end;
use crate::protocol::{Command, Reply, ReplyParser};

/// Owns the control socket.
///
/// Dropping the channel releases the socket; `close` additionally says QUIT.
pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    max_reply_lines: usize,
    reply_timeout: Duration,
}

impl ControlChannel {
    /// Connects to `host:port` and consumes the server greeting.
    ///
    /// Returns the channel together with the final greeting reply.
    pub async fn open(host: &str, port: u16, config: &ClientConfig) -> Result<(Self, Reply)> {
        let addr = format!("{host}:{port}");
        let connected = timeout(config.connect_timeout(), TcpStream::connect(&addr)).await;
        let stream = match connected {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ConnectionError::ConnectFailed { addr, source }.into()),
            Err(_) => return Err(ConnectionError::ConnectTimedOut(addr).into()),
        };

        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let (read_half, write_half) = stream.into_split();
        let mut channel = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer_addr,
            local_addr,
            max_reply_lines: config.max_reply_lines,
            reply_timeout: config.reply_timeout(),
        };

        // 120 "service ready in nnn minutes" precedes the real greeting
        let mut greeting = channel.read_reply().await?;
        while greeting.is_preliminary() {
            info!("Server {} not ready yet: {}", peer_addr, greeting);
            greeting = channel.read_reply().await?;
        }
        if !greeting.is_completion() {
            return Err(ConnectionError::GreetingRejected(greeting).into());
        }

        info!("Connected to {} ({} -> {})", addr, local_addr, peer_addr);
        Ok((channel, greeting))
    }

    /// Writes `command` followed by CRLF and reads its reply.
    pub async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        debug!("--> {:?}", command);
        self.writer
            .write_all(command.to_line().as_bytes())
            .await
            .map_err(ProtocolError::Io)?;
        self.writer.flush().await.map_err(ProtocolError::Io)?;
        self.read_reply().await
    }

    /// Reads one reply without sending anything first.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let reply = timeout(
            self.reply_timeout,
            read_reply_from(&mut self.reader, self.max_reply_lines),
        )
        .await
        .map_err(|_| ProtocolError::ReplyTimedOut)??;
        debug!("<-- {}", reply);
        Ok(reply)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Says QUIT and releases the socket. Failures are only logged.
    pub async fn close(mut self) {
        match self.send_command(&Command::Quit).await {
            Ok(reply) => debug!("Control connection to {} closed: {}", self.peer_addr, reply),
            Err(e) => debug!("QUIT to {} failed: {}", self.peer_addr, e),
        }
        let _ = self.writer.shutdown().await;
    }
}

/// Reads lines from `reader` until one full reply has been parsed.
///
/// End of stream before the reply is complete is a `ProtocolError`,
/// never a malformed reply.
pub async fn read_reply_from<R>(reader: &mut R, max_lines: usize) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut parser = ReplyParser::new(max_lines);
    let mut buf = Vec::with_capacity(128);

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(ProtocolError::Io)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Err(FtpClientError::Protocol(ProtocolError::ConnectionClosed));
        }
        if let Some(reply) = parser.feed_line(trim_line_end(&buf))? {
            return Ok(reply);
        }
    }
}
