mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mfpipe", version, about = "Multi-channel media pipe CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_put_subcommand() {
        let cli = Cli::try_parse_from([
            "mfpipe",
            "put",
            "/tmp/test.pipe",
            "--channel",
            "ch1",
            "--data",
            "hello",
            "--flags",
            "0x20",
            "--timeout",
            "500ms",
        ])
        .expect("put args should parse");

        match cli.command {
            Command::Put(args) => {
                assert_eq!(args.channel, "ch1");
                assert_eq!(args.flags, 0x20);
                assert_eq!(args.timeout, Duration::from_millis(500));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "mfpipe",
            "put",
            "/tmp/test.pipe",
            "--message",
            "evt",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn param_requires_message() {
        let err = Cli::try_parse_from(["mfpipe", "put", "/tmp/test.pipe", "--param", "p"])
            .expect_err("--param alone should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from([
            "mfpipe",
            "get",
            "udp://127.0.0.1:5000",
            "--messages",
            "--count",
            "2",
            "--timeout",
            "3s",
        ])
        .expect("get args should parse");

        match cli.command {
            Command::Get(args) => {
                assert!(args.messages);
                assert_eq!(args.count, Some(2));
                assert_eq!(args.timeout, Some(Duration::from_secs(3)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_duration() {
        let err = Cli::try_parse_from(["mfpipe", "get", "/tmp/p", "--timeout", "soon"])
            .expect_err("bad duration should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
