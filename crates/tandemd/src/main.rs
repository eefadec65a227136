//! Tandem Daemon (tandemd)
//!
//! The server process for tandem collaborative editing sessions. Hosts one
//! shared document on a central replica and relays edits between every
//! connected client.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (WebSocket on 9640)
//! tandemd
//!
//! # Custom port
//! tandemd --port 7000
//!
//! # Seed the document from a file
//! tandemd --seed notes.txt
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tandem_core::Timestamp;
use tandem_transport::CollabServer;

/// Tandem Daemon - collaborative editing server
#[derive(Parser, Debug)]
#[command(name = "tandemd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket port to listen on
    #[arg(long, env = "TANDEM_PORT", default_value = "9640")]
    port: u16,

    /// Bind address
    #[arg(long, env = "TANDEM_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TANDEM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seed the shared document with the contents of this file
    #[arg(long, env = "TANDEM_SEED")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .init();

    print_banner();

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    let server = CollabServer::new(addr);

    if let Some(path) = &args.seed {
        let text = std::fs::read_to_string(path)?;
        let replica = server.replica();
        let mut guard = replica.lock();
        let mut anchor = Timestamp::LEFT;
        for ch in text.chars() {
            anchor = guard.add_right(anchor, ch)?;
        }
        info!(
            path = %path.display(),
            atoms = text.chars().count(),
            "seeded document"
        );
    }

    info!(port = args.port, bind = %args.bind, "starting tandem daemon");

    let running = tokio::spawn(async move {
        if let Err(err) = server.run().await {
            tracing::error!(error = %err, "server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutting down...");
    running.abort();

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ╔╦╗╔═╗╔╗╔╔╦╗╔═╗╔╦╗
   ║ ╠═╣║║║ ║║║╣ ║║║
   ╩ ╩ ╩╝╚╝═╩╝╚═╝╩ ╩
  Collaborative plain-text editing
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
