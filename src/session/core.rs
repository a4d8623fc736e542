use std::io;
use std::net::SocketAddr;

use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::control::ControlChannel;
use crate::error::{FtpClientError, ProtocolError, Result, SequenceError, TransferError};
use crate::protocol::{Command, Reply, ReplyClass, TransferType};
use crate::session::lines::RetrieveLines;
use crate::session::state::{Operation, SessionState};
use crate::transfer::{
    DataChannel, DataConnector, TransferMode, negotiate_active, negotiate_passive,
};

/// One FTP client session: a control connection plus at most one data
/// connection at a time.
///
/// Operations take `&mut self`, so commands on the control channel can never
/// overlap. Sockets are released when the session is closed or dropped.
pub struct Session {
    config: ClientConfig,
    control: Option<ControlChannel>,
    data: Option<DataChannel>,
    state: SessionState,
    mode: TransferMode,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        let mode = config.initial_transfer_mode();
        Self {
            config,
            control: None,
            data: None,
            state: SessionState::Disconnected,
            mode,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    /// Selects the mode for the next transfer. A transfer already in
    /// progress keeps the mode it started with.
    pub fn set_transfer_mode(&mut self, mode: TransferMode) {
        info!("Transfer mode set to {}", mode);
        self.mode = mode;
    }

    /// Opens the control connection and consumes the greeting.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<Reply> {
        self.prepare(Operation::Connect).await?;
        let (control, greeting) = ControlChannel::open(host, port, &self.config).await?;
        self.control = Some(control);
        self.state = SessionState::Connected;
        Ok(greeting)
    }

    /// USER followed by PASS when the server asks for a password.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<Reply> {
        let reply = self.user(user).await?;
        if reply.is_completion() {
            return Ok(reply);
        }
        self.pass(password).await
    }

    /// Sends USER. A 3xx reply leaves the session waiting for `pass`.
    pub async fn user(&mut self, user: &str) -> Result<Reply> {
        self.prepare(Operation::User).await?;
        let reply = self.command(&Command::User(user.to_string())).await?;
        match reply.class() {
            ReplyClass::Completion => {
                info!("Logged in as {} without password", user);
                self.state = SessionState::LoggedIn;
                Ok(reply)
            }
            ReplyClass::Intermediate => {
                self.state = SessionState::AwaitingPassword;
                Ok(reply)
            }
            _ => {
                warn!("USER {} rejected: {}", user, reply);
                self.state = SessionState::Connected;
                Err(FtpClientError::Authentication(reply))
            }
        }
    }

    /// Sends PASS. Only valid right after a 3xx reply to USER.
    pub async fn pass(&mut self, password: &str) -> Result<Reply> {
        self.prepare(Operation::Pass).await?;
        let reply = self.command(&Command::Pass(password.to_string())).await?;
        if reply.is_completion() {
            info!("Login accepted: {}", reply);
            self.state = SessionState::LoggedIn;
            Ok(reply)
        } else {
            warn!("Login rejected: {}", reply);
            self.state = SessionState::Connected;
            Err(FtpClientError::Authentication(reply))
        }
    }

    /// Keep-alive probe; requires a 2xx reply.
    pub async fn noop(&mut self) -> Result<Reply> {
        self.prepare(Operation::Noop).await?;
        let reply = self.command(&Command::Noop).await?;
        if !reply.is_completion() {
            return Err(ProtocolError::UnexpectedReply {
                command: Command::Noop.to_string(),
                reply,
            }
            .into());
        }
        Ok(reply)
    }

    /// Uploads `lines` as text, each terminated with CRLF.
    ///
    /// Returns the number of bytes written to the data channel.
    pub async fn store_lines<I, S>(&mut self, remote: &str, lines: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.start_transfer(Command::Stor(remote.to_string()), TransferType::Ascii)
            .await?;
        let result = match self.data.as_mut() {
            Some(data) => data.send_lines(lines).await,
            None => Err(no_data_channel()),
        };
        self.complete_transfer(result).await
    }

    /// Uploads the bytes of `source` unchanged.
    pub async fn store_binary<R>(&mut self, remote: &str, source: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.start_transfer(Command::Stor(remote.to_string()), TransferType::Image)
            .await?;
        let result = match self.data.as_mut() {
            Some(data) => data.send_binary(source).await,
            None => Err(no_data_channel()),
        };
        self.complete_transfer(result).await
    }

    /// Starts a text download and returns its lines as a lazy sequence.
    ///
    /// The sequence borrows the session; the completion reply is consumed
    /// when the sequence is exhausted or finished.
    pub async fn retrieve_lines(&mut self, remote: &str) -> Result<RetrieveLines<'_>> {
        self.start_transfer(Command::Retr(remote.to_string()), TransferType::Ascii)
            .await?;
        Ok(RetrieveLines::new(self))
    }

    /// Downloads raw bytes into `sink` and returns how many were written.
    pub async fn retrieve_binary<W>(&mut self, remote: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.start_transfer(Command::Retr(remote.to_string()), TransferType::Image)
            .await?;
        let result = match self.data.as_mut() {
            Some(data) => data.receive_binary(sink).await,
            None => Err(no_data_channel()),
        };
        self.complete_transfer(result).await
    }

    /// Releases the data channel, says QUIT and releases the control channel.
    pub async fn close(&mut self) {
        if let Some(data) = self.data.take() {
            warn!("Closing session with a transfer still open");
            let _ = data.close().await;
        }
        if let Some(control) = self.control.take() {
            control.close().await;
        }
        self.state = SessionState::Closed;
    }

    // --------------------
    // Transfer plumbing
    // --------------------

    /// TYPE, data channel negotiation, transfer command and its 1xx reply.
    async fn start_transfer(&mut self, command: Command, transfer_type: TransferType) -> Result<()> {
        self.prepare(Operation::Transfer).await?;

        let reply = self.command(&Command::Type(transfer_type)).await?;
        if !reply.is_completion() {
            return Err(TransferError::Rejected(reply).into());
        }

        // the mode is fixed for this transfer from here on
        let mode = self.mode;
        let connector = self.negotiate(mode).await?;

        let reply = self.command(&command).await?;
        if !reply.is_preliminary() {
            warn!("{} refused: {}", command, reply);
            return Err(TransferError::Rejected(reply).into());
        }
        info!("{} started in {} mode via {}: {}", command, mode, connector.endpoint(), reply);

        self.state = SessionState::Transferring;
        match connector
            .establish(self.config.accept_timeout(), self.config.buffer_size)
            .await
        {
            Ok(data) => {
                self.data = Some(data);
                Ok(())
            }
            Err(e) => {
                self.abandon_transfer().await;
                Err(e)
            }
        }
    }

    async fn negotiate(&mut self, mode: TransferMode) -> Result<DataConnector> {
        let Some(control) = self.control.as_mut() else {
            return Err(not_connected(self.state, Operation::Transfer.name()));
        };
        let result = match mode {
            TransferMode::Passive => {
                negotiate_passive(
                    control,
                    self.config.trust_server_pasv_address,
                    self.config.connect_timeout(),
                )
                .await
            }
            TransferMode::Active => {
                let ip = self
                    .config
                    .active_bind_address
                    .unwrap_or_else(|| control.local_addr().ip());
                negotiate_active(control, SocketAddr::new(ip, 0)).await
            }
        };
        result.map_err(|e| self.check_fatal(e))
    }

    /// Closes the data channel and requires a 2xx completion reply.
    async fn complete_transfer(&mut self, result: io::Result<u64>) -> Result<u64> {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Data transfer failed: {}", e);
                self.abandon_transfer().await;
                return Err(e.into());
            }
        };
        self.finish_transfer().await?;
        Ok(bytes)
    }

    pub(crate) async fn finish_transfer(&mut self) -> Result<Reply> {
        if let Some(data) = self.data.take() {
            if let Err(e) = data.close().await {
                warn!("Closing data connection failed: {}", e);
            }
        }
        let reply = self.read_reply().await?;
        self.state = SessionState::LoggedIn;
        if reply.is_completion() {
            info!("Transfer complete: {}", reply);
            Ok(reply)
        } else {
            warn!("Transfer failed after data was sent: {}", reply);
            Err(TransferError::Incomplete(reply).into())
        }
    }

    /// Drops the data channel and drains the completion reply, whatever it says.
    pub(crate) async fn abort_transfer(&mut self) -> Result<()> {
        drop(self.data.take());
        let reply = self.read_reply().await?;
        if !reply.is_completion() {
            info!("Aborted transfer ended with {}", reply);
        }
        self.state = SessionState::LoggedIn;
        Ok(())
    }

    /// Cleanup after a failed transfer: drops the data channel and drains
    /// the completion reply within `drain_timeout`. Failing that, the
    /// control channel is out of step and the session is closed.
    pub(crate) async fn abandon_transfer(&mut self) {
        drop(self.data.take());
        let drained = timeout(self.config.drain_timeout(), self.read_reply()).await;
        match drained {
            Ok(Ok(reply)) => {
                info!("Failed transfer ended with {}", reply);
                self.state = SessionState::LoggedIn;
            }
            Ok(Err(e)) => {
                warn!("Draining failed transfer: {}", e);
                self.shut_down();
            }
            Err(_) => {
                warn!(
                    "No reply to failed transfer after {:?}, closing session",
                    self.config.drain_timeout()
                );
                self.shut_down();
            }
        }
    }

    pub(crate) fn data_channel(&mut self) -> io::Result<&mut DataChannel> {
        self.data.as_mut().ok_or_else(no_data_channel)
    }

    // --------------------
    // Control plumbing
    // --------------------

    /// Drains an unfinished transfer, then checks `operation` against the state.
    async fn prepare(&mut self, operation: Operation) -> Result<()> {
        if self.state == SessionState::Transferring {
            warn!("Previous transfer was not finished, draining it before {}", operation.name());
            self.abort_transfer().await?;
        }
        self.state.check(operation)?;
        Ok(())
    }

    async fn command(&mut self, command: &Command) -> Result<Reply> {
        if !command.is_well_formed() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid argument for {}", command.verb()),
            )
            .into());
        }
        let result = match self.control.as_mut() {
            Some(control) => control.send_command(command).await,
            None => return Err(not_connected(self.state, command.verb())),
        };
        result.map_err(|e| self.check_fatal(e))
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let result = match self.control.as_mut() {
            Some(control) => control.read_reply().await,
            None => return Err(not_connected(self.state, "reply")),
        };
        result.map_err(|e| self.check_fatal(e))
    }

    /// Control channel failures end the session.
    fn check_fatal(&mut self, error: FtpClientError) -> FtpClientError {
        if error.is_fatal() {
            error!("Control channel failed, closing session: {}", error);
            self.shut_down();
        }
        error
    }

    /// Releases both channels without talking to the server.
    fn shut_down(&mut self) {
        self.data = None;
        self.control = None;
        self.state = SessionState::Closed;
    }
}

fn not_connected(state: SessionState, operation: &'static str) -> FtpClientError {
    SequenceError {
        operation,
        state: state.name(),
    }
    .into()
}

fn no_data_channel() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no data channel open")
}
