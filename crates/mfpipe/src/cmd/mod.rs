use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod create;
pub mod get;
pub mod put;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Provision a pipe (FIFO file or UDP socket).
    Create(CreateArgs),
    /// Put buffers, frames or messages on a pipe.
    Put(PutArgs),
    /// Take entries off a pipe and print them.
    Get(GetArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Create(args) => create::run(args, format),
        Command::Put(args) => put::run(args),
        Command::Get(args) => get::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Pipe identifier: a FIFO path or udp://<ipv4>:<port>.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Pipe identifier: a FIFO path or udp://<ipv4>:<port>.
    pub id: String,
    /// Channel to put on.
    #[arg(long, short = 'c', default_value = "")]
    pub channel: String,
    /// String payload.
    #[arg(long, conflicts_with_all = ["file", "message"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "message"])]
    pub file: Option<PathBuf>,
    /// Send a control message with this name instead of a payload.
    #[arg(long, value_name = "NAME", conflicts_with_all = ["data", "file", "frame"])]
    pub message: Option<String>,
    /// Message parameter (with --message).
    #[arg(long, requires = "message")]
    pub param: Option<String>,
    /// Send the payload as the video bytes of a frame.
    #[arg(long)]
    pub frame: bool,
    /// Buffer flag bits (e.g. 1, 0x20).
    #[arg(long, default_value = "0x1", value_parser = parse_flags)]
    pub flags: u32,
    /// Number of times to put the entry.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
    /// Queue depth of the write side.
    #[arg(long, default_value_t = 16)]
    pub depth: usize,
    /// Deadline for connecting and for each put (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Pipe identifier: a FIFO path or udp://<ipv4>:<port>.
    pub id: String,
    /// Channel to read from.
    #[arg(long, short = 'c', default_value = "")]
    pub channel: String,
    /// Read control messages instead of payloads.
    #[arg(long)]
    pub messages: bool,
    /// Exit after receiving N entries.
    #[arg(long)]
    pub count: Option<usize>,
    /// Queue depth of the read side.
    #[arg(long, default_value_t = 16)]
    pub depth: usize,
    /// Give up if no entry arrives within this long (e.g. 5s, 500ms).
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: '{input}'")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: '{unit}'"),
        )),
    }
}

/// Parse decimal or `0x`-prefixed hexadecimal flag bits.
pub fn parse_flags(input: &str) -> CliResult<u32> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid flags: '{input}'")))
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
