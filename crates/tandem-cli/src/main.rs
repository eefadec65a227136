//! Tandem CLI Client
//!
//! Interactive terminal client for tandem servers. Joins the shared
//! document and edits it by character position; remote edits stream into
//! the local replica in the background.
//!
//! # Usage
//!
//! ```bash
//! # Join a local server
//! tandem
//!
//! # Join a remote session
//! tandem --url ws://example.com:9640
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use tandem_core::{Replica, Timestamp};
use tandem_transport::{connect, SharedPeer};

/// Tandem Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(author, version, about = "Tandem CLI - collaborative text session client")]
struct Args {
    /// Server URL
    #[arg(short, long, default_value = "ws://127.0.0.1:9640", env = "TANDEM_URL")]
    url: String,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let session = connect(&args.url)
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;

    if !args.quiet {
        println!(
            "{}",
            format!(
                r#"
  ╔╦╗╔═╗╔╗╔╔╦╗╔═╗╔╦╗  CLI
   ║ ╠═╣║║║ ║║║╣ ║║║  Joined {} as replica {}
   ╩ ╩ ╩╝╚╝═╩╝╚═╝╩ ╩  Type 'help' for commands, 'quit' to exit
"#,
                args.url, session.id
            )
            .cyan()
        );
    }

    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".tandem_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "tandem".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match dispatch(line, &session.peer) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(err) => eprintln!("{} {err:#}", "Error:".red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("{} {err}", "Error:".red());
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    session.disconnect();
    Ok(())
}

/// Handle one command line. Returns `true` when the session should end.
fn dispatch(line: &str, peer: &SharedPeer<Replica>) -> Result<bool> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default().to_lowercase();

    match command.as_str() {
        "quit" | "exit" => return Ok(true),
        "help" => print_help(),
        "show" => {
            let guard = peer.lock();
            let text = guard.text();
            if text.is_empty() {
                println!("{}", "(empty document)".dimmed());
            } else {
                println!("{text}");
            }
        }
        "insert" => {
            let pos: usize = parts
                .next()
                .context("usage: insert <pos> <text>")?
                .parse()
                .context("position must be a number")?;
            let text = parts.next().context("usage: insert <pos> <text>")?;
            insert_at(&mut peer.lock(), pos, text)?;
        }
        "delete" => {
            let pos: usize = parts
                .next()
                .context("usage: delete <pos> <len>")?
                .parse()
                .context("position must be a number")?;
            let len: usize = parts
                .next()
                .context("usage: delete <pos> <len>")?
                .parse()
                .context("length must be a number")?;
            delete_at(&mut peer.lock(), pos, len)?;
        }
        other => bail!("unknown command '{other}', try 'help'"),
    }

    Ok(false)
}

/// Insert `text` so its first character lands at visible position `pos`.
fn insert_at(replica: &mut Replica, pos: usize, text: &str) -> Result<()> {
    let mut anchor = if pos == 0 {
        Timestamp::LEFT
    } else {
        replica
            .visible()
            .nth(pos - 1)
            .map(|(t, _)| t)
            .context("position past end of document")?
    };
    for ch in text.chars() {
        anchor = replica.add_right(anchor, ch)?;
    }
    Ok(())
}

/// Remove `len` visible characters starting at position `pos`.
fn delete_at(replica: &mut Replica, pos: usize, len: usize) -> Result<()> {
    let targets: Vec<Timestamp> = replica
        .visible()
        .skip(pos)
        .take(len)
        .map(|(t, _)| t)
        .collect();
    if targets.len() < len {
        bail!("range reaches past end of document");
    }
    for t in targets {
        replica.remove(t)?;
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"
  show                  print the shared document
  insert <pos> <text>   insert text at character position
  delete <pos> <len>    delete characters starting at position
  help                  this message
  quit                  leave the session
"#
    );
}
