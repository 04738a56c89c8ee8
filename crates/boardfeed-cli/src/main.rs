//! boardfeed CLI Client
//!
//! Polls a boardfeed daemon the same way a browser client does.
//!
//! # Usage
//!
//! ```bash
//! # Latest event of board 42
//! boardfeed poll 42
//!
//! # Everything after id 17
//! boardfeed poll 42 --since 17
//!
//! # Follow the board, honouring the server's retry hint
//! boardfeed watch 42
//!
//! # Cached snapshot and server health
//! boardfeed snapshot 42
//! boardfeed health
//! ```

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use boardfeed_core::{BoardId, Envelope, Snapshot, UpdateBatch};
use boardfeed_protocol::{HealthStatus, ParsedResponse, PollCursor, Route};
use clap::{Parser, Subcommand};
use colored::*;

/// boardfeed Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "boardfeed")]
#[command(author, version, about = "boardfeed CLI - poll realtime board updates")]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "BOARDFEED_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8080", env = "BOARDFEED_PORT")]
    port: u16,

    /// Socket timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Print raw JSON instead of formatted output
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch updates once
    Poll {
        board: u64,
        /// Last id already seen
        #[arg(long)]
        since: Option<u64>,
    },

    /// Keep polling and print new events as they arrive
    Watch {
        board: u64,
        /// Start after this id instead of the latest event
        #[arg(long)]
        since: Option<u64>,
        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u64>,
    },

    /// Print the board's cached snapshot
    Snapshot { board: u64 },

    /// Check the server and its backing store
    Health,
}

struct Client {
    addr: String,
    timeout: Duration,
}

impl Client {
    fn get(&self, route: &Route) -> Result<ParsedResponse> {
        let mut stream =
            TcpStream::connect(&self.addr).with_context(|| format!("Failed to connect to {}", self.addr))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
            route.target(),
            self.addr
        )?;
        stream.flush()?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;

        Ok(ParsedResponse::parse(&raw)?)
    }

    fn updates(&self, board: BoardId, since: Option<u64>) -> Result<UpdateBatch> {
        let response = self.get(&Route::Updates { board, since })?;
        expect_success(&response)?;
        Ok(response.json()?)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let client = Client {
        addr: format!("{}:{}", args.host, args.port),
        timeout: Duration::from_secs(args.timeout),
    };

    match args.command {
        Command::Poll { board, since } => {
            let batch = client.updates(BoardId::new(board), since)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                for envelope in &batch.events {
                    println!("{}", format_envelope(envelope));
                }
                println!("{}", format_cursor(&batch).dimmed());
            }
        }
        Command::Watch { board, since, max_polls } => {
            watch(&client, BoardId::new(board), since, max_polls, args.json)?;
        }
        Command::Snapshot { board } => {
            let response = client.get(&Route::Snapshot { board: BoardId::new(board) })?;
            if response.status == 404 {
                println!("{}", "(no snapshot)".dimmed());
                return Ok(());
            }
            expect_success(&response)?;
            let snapshot: Snapshot = response.json()?;
            println!("{}", serde_json::to_string_pretty(snapshot.as_value())?);
        }
        Command::Health => {
            let response = client.get(&Route::Health)?;
            expect_success(&response)?;
            let health: HealthStatus = response.json()?;
            if args.json {
                println!("{}", serde_json::to_string(&health)?);
            } else {
                println!("{} backend {}", health.status.green(), color_backend(&health.backend));
            }
        }
    }

    Ok(())
}

fn watch(client: &Client, board: BoardId, since: Option<u64>, max_polls: Option<u64>, json: bool) -> Result<()> {
    let mut cursor = match since {
        Some(since) => PollCursor::resume(since),
        None => PollCursor::new(),
    };

    println!(
        "{}",
        format!("Watching board {} on {} (Ctrl+C to stop)", board, client.addr).cyan()
    );

    let mut polls = 0;
    loop {
        match client.updates(board, cursor.since()) {
            Ok(batch) => {
                for envelope in cursor.apply(batch) {
                    if json {
                        println!("{}", serde_json::to_string(&envelope)?);
                    } else {
                        println!("{}", format_envelope(&envelope));
                    }
                }
            }
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }

        polls += 1;
        if max_polls.map_or(false, |max| polls >= max) {
            return Ok(());
        }
        thread::sleep(cursor.retry());
    }
}

fn expect_success(response: &ParsedResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    match response.error_message() {
        Some(message) => bail!("Server answered {}: {}", response.status, message),
        None => bail!("Server answered {}", response.status),
    }
}

fn format_envelope(envelope: &Envelope) -> String {
    let mut line = format!(
        "{} {} {}",
        format!("#{}", envelope.sequence_id).yellow(),
        envelope.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        envelope.event_name.green().bold(),
    );
    if !envelope.payload.is_empty() {
        line.push(' ');
        line.push_str(&serde_json::Value::Object(envelope.payload.clone()).to_string());
    }
    if envelope.snapshot.is_some() {
        line.push_str(&format!(" {}", "[snapshot]".blue()));
    }
    line
}

fn format_cursor(batch: &UpdateBatch) -> String {
    match batch.latest_id {
        Some(latest) => format!("latestId={} retry={}ms", latest, batch.retry),
        None => format!("latestId=(none) retry={}ms", batch.retry),
    }
}

fn color_backend(state: &str) -> ColoredString {
    match state {
        "connected" => state.green(),
        "failed" => state.red(),
        _ => state.yellow(),
    }
}
