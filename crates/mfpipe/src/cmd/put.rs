use std::fs;

use mfpipe_frame::{Buffer, BufferFlags, Frame, Payload};
use mfpipe_pipe::Pipe;
use tracing::debug;

use crate::cmd::PutArgs;
use crate::exit::{io_error, pipe_error, CliResult, SUCCESS};

pub fn run(args: PutArgs) -> CliResult<i32> {
    let mut pipe = Pipe::new();
    pipe.open(&args.id, args.depth, "W", args.timeout)
        .map_err(|err| pipe_error("open failed", err))?;

    if let Some(name) = &args.message {
        let param = args.param.as_deref().unwrap_or_default();
        for _ in 0..args.count {
            pipe.message_put(&args.channel, name, param, args.timeout)
                .map_err(|err| pipe_error("message put failed", err))?;
        }
    } else {
        let payload = resolve_payload(&args)?;
        for _ in 0..args.count {
            pipe.put(&args.channel, payload.clone(), args.timeout)
                .map_err(|err| pipe_error("put failed", err))?;
        }
    }
    debug!(count = args.count, channel = %args.channel, "entries queued");

    // Close drains the write queue onto the transport.
    pipe.close().map_err(|err| pipe_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &PutArgs) -> CliResult<Payload> {
    let data = if let Some(data) = &args.data {
        data.as_bytes().to_vec()
    } else if let Some(path) = &args.file {
        fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?
    } else {
        Vec::new()
    };

    if args.frame {
        return Ok(Frame {
            video: data.into(),
            ..Frame::default()
        }
        .into());
    }
    Ok(Buffer::new(BufferFlags::from_bits(args.flags), data).into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn args() -> PutArgs {
        PutArgs {
            id: "/tmp/unused".into(),
            channel: String::new(),
            data: Some("hello".into()),
            file: None,
            message: None,
            param: None,
            frame: false,
            flags: 0x20,
            count: 1,
            depth: 4,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn data_becomes_buffer_with_flags() {
        match resolve_payload(&args()).unwrap() {
            Payload::Buffer(buffer) => {
                assert_eq!(buffer.flags, BufferFlags::VIDEO_DATA);
                assert_eq!(&buffer.data[..], b"hello");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn frame_flag_wraps_video() {
        let args = PutArgs {
            frame: true,
            ..args()
        };
        match resolve_payload(&args).unwrap() {
            Payload::Frame(frame) => {
                assert_eq!(&frame.video[..], b"hello");
                assert!(frame.audio.is_empty());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let args = PutArgs {
            data: None,
            file: Some("/nonexistent/mfpipe/input.bin".into()),
            ..args()
        };
        assert!(resolve_payload(&args).is_err());
    }
}
