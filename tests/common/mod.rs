//! Scripted FTP server used by the integration tests.
//!
//! Speaks just enough of the protocol for the client: USER, PASS, NOOP,
//! TYPE, PASV, PORT, STOR, RETR and QUIT. Stored files live in memory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use rax_ftp_client::ClientConfig;
use rax_ftp_client::protocol::responses::{self, format_response};

pub const USER: &str = "hkhan";
pub const PASSWORD: &str = "password";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        connect_timeout_ms: 2_000,
        reply_timeout_ms: 5_000,
        accept_timeout_ms: 2_000,
        ..ClientConfig::default()
    }
}

/// Knobs for misbehaving servers
#[derive(Clone, Default)]
pub struct Behavior {
    /// Accept PORT but never connect back; answer 425 right after 150
    pub never_connect_active: bool,
    /// Read STOR data, then report a local error instead of 226
    pub fail_stor_completion: bool,
    /// Drop the control connection when NOOP arrives
    pub hang_up_on_noop: bool,
    /// Send 150 for STOR, then nothing at all
    pub silent_after_stor_start: bool,
    /// Answer PASV with 425
    pub reject_pasv: bool,
    /// Answer PORT with 501
    pub reject_port: bool,
    /// Answer PASV with a 227 that carries no endpoint
    pub garbage_pasv: bool,
}

#[derive(Default)]
struct Shared {
    files: HashMap<String, Vec<u8>>,
    commands: Vec<String>,
}

pub struct FakeServer {
    addr: SocketAddr,
    shared: Arc<Mutex<Shared>>,
}

enum PendingData {
    Passive(TcpListener),
    Active(SocketAddr),
}

impl FakeServer {
    pub async fn start() -> Self {
        Self::with_behavior(Behavior::default()).await
    }

    pub async fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let accept_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                let Ok((stream, client_addr)) = listener.accept().await else {
                    break;
                };
                let shared = Arc::clone(&accept_shared);
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, shared, behavior).await {
                        warn!("Fake server lost client {}: {}", client_addr, e);
                    }
                });
            }
        });

        Self { addr, shared }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.shared.lock().await.files.get(name).cloned()
    }

    pub async fn put_file(&self, name: &str, content: &[u8]) {
        self.shared
            .lock()
            .await
            .files
            .insert(name.to_string(), content.to_vec());
    }

    /// Command verbs received so far, in order.
    pub async fn verbs(&self) -> Vec<String> {
        self.shared
            .lock()
            .await
            .commands
            .iter()
            .map(|c| c.split_whitespace().next().unwrap_or("").to_string())
            .collect()
    }
}

async fn reply(writer: &mut OwnedWriteHalf, code: u16, message: &str) -> std::io::Result<()> {
    writer.write_all(format_response(code, message).as_bytes()).await
}

async fn handle_client(
    stream: TcpStream,
    shared: Arc<Mutex<Shared>>,
    behavior: Behavior,
) -> std::io::Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let mut user: Option<String> = None;
    let mut logged_in = false;
    let mut pending: Option<PendingData> = None;

    writer
        .write_all(b"220-Welcome to the fake server\r\n")
        .await?;
    reply(&mut writer, responses::READY, "Service Ready").await?;

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (command.to_ascii_uppercase(), String::new()),
        };
        shared.lock().await.commands.push(command.clone());

        match verb.as_str() {
            "USER" => {
                user = Some(arg);
                logged_in = false;
                reply(&mut writer, responses::PASSWORD_REQUIRED, "User name okay, need password").await?;
            }
            "PASS" => {
                if user.as_deref() != Some(USER) {
                    reply(&mut writer, responses::BAD_SEQUENCE, "Bad sequence of commands").await?;
                } else if arg == PASSWORD {
                    logged_in = true;
                    reply(&mut writer, responses::LOGIN_SUCCESS, "User logged in, proceed").await?;
                } else {
                    reply(&mut writer, responses::AUTH_FAILED, "Not logged in").await?;
                }
            }
            "NOOP" if behavior.hang_up_on_noop => return Ok(()),
            "NOOP" if logged_in => reply(&mut writer, responses::OK, "Command okay").await?,
            "TYPE" if logged_in => reply(&mut writer, responses::OK, "Type set").await?,
            "PASV" if logged_in && behavior.reject_pasv => {
                reply(&mut writer, responses::CANNOT_OPEN_DATA, "Passive mode not available").await?;
            }
            "PASV" if logged_in && behavior.garbage_pasv => {
                reply(&mut writer, responses::PASSIVE_MODE, "Entering Passive Mode (somewhere)").await?;
            }
            "PORT" if logged_in && behavior.reject_port => {
                reply(&mut writer, 501, "Syntax error in parameters or arguments").await?;
            }
            "PASV" if logged_in => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let [p1, p2] = listener.local_addr()?.port().to_be_bytes();
                pending = Some(PendingData::Passive(listener));
                let message = format!("Entering Passive Mode (127,0,0,1,{p1},{p2})");
                reply(&mut writer, responses::PASSIVE_MODE, &message).await?;
            }
            "PORT" if logged_in => match parse_port(&arg) {
                Some(addr) => {
                    pending = Some(PendingData::Active(addr));
                    reply(&mut writer, responses::OK, "PORT command successful").await?;
                }
                None => reply(&mut writer, 501, "Syntax error in parameters or arguments").await?,
            },
            "STOR" if logged_in => {
                reply(&mut writer, responses::FILE_STATUS_OK, "Opening data connection").await?;
                if behavior.silent_after_stor_start {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    return Ok(());
                }
                let Some(mut data) = open_data(pending.take(), &behavior, &mut writer).await? else {
                    continue;
                };
                let mut content = Vec::new();
                if data.read_to_end(&mut content).await.is_err() {
                    reply(&mut writer, responses::TRANSFER_ABORTED, "Transfer aborted").await?;
                    continue;
                }
                info!("Fake server stored {} bytes as {}", content.len(), arg);
                shared.lock().await.files.insert(arg, content);
                if behavior.fail_stor_completion {
                    reply(&mut writer, responses::LOCAL_ERROR, "Local error in processing").await?;
                } else {
                    reply(&mut writer, responses::TRANSFER_COMPLETE, "Transfer complete").await?;
                }
            }
            "RETR" if logged_in => {
                let content = shared.lock().await.files.get(&arg).cloned();
                let Some(content) = content else {
                    pending = None;
                    reply(&mut writer, responses::FILE_NOT_FOUND, "Requested action not taken").await?;
                    continue;
                };
                reply(&mut writer, responses::FILE_STATUS_OK, "Opening data connection").await?;
                let Some(mut data) = open_data(pending.take(), &behavior, &mut writer).await? else {
                    continue;
                };
                let sent = async {
                    data.write_all(&content).await?;
                    data.shutdown().await
                }
                .await;
                drop(data);
                match sent {
                    Ok(()) => reply(&mut writer, responses::TRANSFER_COMPLETE, "Transfer complete").await?,
                    Err(_) => reply(&mut writer, responses::TRANSFER_ABORTED, "Transfer aborted").await?,
                }
            }
            "QUIT" => {
                reply(&mut writer, responses::CLOSING, "Goodbye").await?;
                return Ok(());
            }
            "NOOP" | "TYPE" | "PASV" | "PORT" | "STOR" | "RETR" => {
                reply(&mut writer, responses::AUTH_FAILED, "Not logged in").await?;
            }
            _ => reply(&mut writer, 502, "Command not implemented").await?,
        }
    }
}

/// Opens the data connection for a transfer, or answers 425.
async fn open_data(
    pending: Option<PendingData>,
    behavior: &Behavior,
    writer: &mut OwnedWriteHalf,
) -> std::io::Result<Option<TcpStream>> {
    let stream = match pending {
        Some(PendingData::Passive(listener)) => {
            tokio::time::timeout(Duration::from_secs(5), listener.accept())
                .await
                .ok()
                .and_then(|r| r.ok())
                .map(|(s, _)| s)
        }
        Some(PendingData::Active(_)) if behavior.never_connect_active => None,
        Some(PendingData::Active(addr)) => TcpStream::connect(addr).await.ok(),
        None => None,
    };
    if stream.is_none() {
        reply(writer, responses::CANNOT_OPEN_DATA, "Can't open data connection").await?;
    }
    Ok(stream)
}

fn parse_port(arg: &str) -> Option<SocketAddr> {
    let numbers = arg
        .split(',')
        .map(|n| n.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    let [h1, h2, h3, h4, p1, p2] = numbers[..] else {
        return None;
    };
    let port = u16::from_be_bytes([p1, p2]);
    Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(h1, h2, h3, h4), port)))
}
