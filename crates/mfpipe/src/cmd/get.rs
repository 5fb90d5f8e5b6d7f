use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mfpipe_pipe::{Pipe, PipeError, DEFAULT_OPEN_TIMEOUT};
use tracing::debug;

use crate::cmd::{install_ctrlc_handler, GetArgs};
use crate::exit::{pipe_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_received, OutputFormat, Received};

/// Slice of each blocking get, so Ctrl-C is noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(200);

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut pipe = Pipe::new();
    pipe.create(&args.id)
        .map_err(|err| pipe_error("create failed", err))?;
    pipe.open(&args.id, args.depth, "R", DEFAULT_OPEN_TIMEOUT)
        .map_err(|err| pipe_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    let mut waiting_since = Instant::now();

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| received >= count) {
            break;
        }

        let slice = match args.timeout {
            Some(timeout) => {
                let waited = waiting_since.elapsed();
                if waited >= timeout {
                    let _ = pipe.close();
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("no entry on channel '{}' within {timeout:?}", args.channel),
                    ));
                }
                POLL_SLICE.min(timeout - waited)
            }
            None => POLL_SLICE,
        };

        let result = if args.messages {
            pipe.message_get(&args.channel, slice).map(Received::Message)
        } else {
            pipe.get(&args.channel, slice).map(Received::Payload)
        };

        match result {
            Ok(entry) => {
                print_received(&args.channel, &entry, format);
                received = received.saturating_add(1);
                waiting_since = Instant::now();
            }
            Err(PipeError::Timeout(_)) => continue,
            Err(err) => return Err(pipe_error("get failed", err)),
        }
    }

    debug!(received, "get finished");
    pipe.close().map_err(|err| pipe_error("close failed", err))?;
    Ok(SUCCESS)
}
