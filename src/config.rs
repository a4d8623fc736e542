//! Configuration management for the RAX FTP client
//!
//! Client behavior settings are layered from built-in defaults, an optional
//! `rax-ftp-client.toml` file and `RAX_FTP_CLIENT_*` environment variables.

use std::net::IpAddr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::transfer::TransferMode;

const CONFIG_FILE: &str = "rax-ftp-client";
const ENV_PREFIX: &str = "RAX_FTP_CLIENT";

/// Settings that shape how a session talks to the server
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Timeout for establishing the control connection
    pub connect_timeout_ms: u64,

    /// Timeout for each control-channel reply
    pub reply_timeout_ms: u64,

    /// How long active mode waits for the server to connect back
    pub accept_timeout_ms: u64,

    /// How long a failed transfer waits for the server's closing reply
    pub drain_timeout_ms: u64,

    /// Upper bound on lines in one multi-line reply
    pub max_reply_lines: usize,

    /// Buffer size for data channel transfers
    pub buffer_size: usize,

    /// Initial transfer mode of a new session
    pub passive: bool,

    /// Local address for active mode listeners.
    /// Defaults to the local address of the control connection.
    pub active_bind_address: Option<IpAddr>,

    /// Use the host from the PASV reply instead of the control peer address
    pub trust_server_pasv_address: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            reply_timeout_ms: 30_000,
            accept_timeout_ms: 10_000,
            drain_timeout_ms: 2_000,
            max_reply_lines: 128,
            buffer_size: 8192,
            passive: true,
            active_bind_address: None,
            trust_server_pasv_address: false,
        }
    }
}

/// Target of the demo binary
#[derive(Debug, Deserialize, Clone)]
pub struct DemoConfig {
    pub host: String,
    pub port: u16,
    pub remote_file: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ClientConfig {
    /// Load configuration from the optional config file with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = ClientConfig::default();
        let settings = Config::builder()
            .set_default("connect_timeout_ms", defaults.connect_timeout_ms)?
            .set_default("reply_timeout_ms", defaults.reply_timeout_ms)?
            .set_default("accept_timeout_ms", defaults.accept_timeout_ms)?
            .set_default("drain_timeout_ms", defaults.drain_timeout_ms)?
            .set_default("max_reply_lines", defaults.max_reply_lines as u64)?
            .set_default("buffer_size", defaults.buffer_size as u64)?
            .set_default("passive", defaults.passive)?
            .set_default("trust_server_pasv_address", defaults.trust_server_pasv_address)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.connect_timeout_ms == 0 || self.reply_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "control channel timeouts must be greater than 0".into(),
            ));
        }

        if self.accept_timeout_ms == 0 || self.drain_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "data channel timeouts must be greater than 0".into(),
            ));
        }

        if self.max_reply_lines == 0 {
            return Err(config::ConfigError::Message(
                "max_reply_lines must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn initial_transfer_mode(&self) -> TransferMode {
        if self.passive {
            TransferMode::Passive
        } else {
            TransferMode::Active
        }
    }
}

impl DemoConfig {
    /// Load the demo target from the same file and environment as `ClientConfig`
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 2121)?
            .set_default("remote_file", "main.txt")?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
