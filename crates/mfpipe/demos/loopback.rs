//! Loopback over a named pipe: one pipe opened for read and write, a
//! producer thread putting frames on two channels and the main thread
//! draining them in order.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! Or between processes:
//!   cargo run --features cli -- get /tmp/mfpipe-demo --count 3
//!   cargo run --features cli -- put /tmp/mfpipe-demo --data hello --count 3

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mfpipe::frame::{Frame, Time};
use mfpipe::Pipe;

const TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("mfpipe-loopback-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let id = dir.join("pipe").to_string_lossy().into_owned();

    let mut pipe = Pipe::new();
    pipe.create(&id)?;
    pipe.open(&id, 8, "RW", TIMEOUT)?;
    let pipe = Arc::new(pipe);

    let producer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || -> Result<(), mfpipe::PipeError> {
            for i in 0..5i64 {
                let frame = Frame {
                    time: Time {
                        start: i * 400_000,
                        end: (i + 1) * 400_000,
                    },
                    video: vec![i as u8; 1024].into(),
                    ..Frame::default()
                };
                let channel = if i % 2 == 0 { "even" } else { "odd" };
                pipe.put(channel, frame, TIMEOUT)?;
            }
            pipe.message_put("control", "eos", "5", TIMEOUT)
        })
    };

    for channel in ["even", "even", "even", "odd", "odd"] {
        let payload = pipe.get(channel, TIMEOUT)?;
        eprintln!("{channel}: {} with {} bytes", payload.kind(), payload.data_len());
    }
    let eos = pipe.message_get("control", TIMEOUT)?;
    eprintln!("control: {}={}", eos.name, eos.param);

    producer
        .join()
        .map_err(|_| "producer thread panicked")??;
    pipe.close()?;
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
