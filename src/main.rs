//! RAX FTP Client - Entry Point
//!
//! Runs a short session against the configured server: login, NOOP,
//! upload one line, then download it as text and as bytes.

use log::{error, info};
use tokio::io::stdout;

use rax_ftp_client::config::DemoConfig;
use rax_ftp_client::{ClientConfig, Session};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let (config, demo) = match (ClientConfig::load(), DemoConfig::load()) {
        (Ok(config), Ok(demo)) => (config, demo),
        (Err(e), _) | (_, Err(e)) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let mut session = Session::new(config);
    if let Err(e) = run(&mut session, &demo).await {
        error!("Session failed: {}", e);
        session.close().await;
        std::process::exit(1);
    }
    session.close().await;
}

async fn run(session: &mut Session, demo: &DemoConfig) -> rax_ftp_client::Result<()> {
    info!("Connecting to {}:{}", demo.host, demo.port);
    session.connect(&demo.host, demo.port).await?;

    let user = demo.user.as_deref().unwrap_or("anonymous");
    let password = demo.password.as_deref().unwrap_or("guest");
    session.login(user, password).await?;
    session.noop().await?;

    session.store_lines(&demo.remote_file, ["hello world"]).await?;

    let lines = session
        .retrieve_lines(&demo.remote_file)
        .await?
        .collect_lines()
        .await?;
    for line in &lines {
        info!("{}: {}", demo.remote_file, line);
    }

    let bytes = session
        .retrieve_binary(&demo.remote_file, &mut stdout())
        .await?;
    info!("Downloaded {} bytes from {}", bytes, demo.remote_file);
    Ok(())
}
