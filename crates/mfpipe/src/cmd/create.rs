use mfpipe_pipe::Pipe;
use mfpipe_transport::Endpoint;
use serde::Serialize;

use crate::cmd::CreateArgs;
use crate::exit::{pipe_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct CreateOutput<'a> {
    id: &'a str,
    kind: &'static str,
    created: bool,
}

pub fn run(args: CreateArgs, format: OutputFormat) -> CliResult<i32> {
    let mut pipe = Pipe::new();
    pipe.create(&args.id)
        .map_err(|err| pipe_error("create failed", err))?;
    pipe.close().map_err(|err| pipe_error("close failed", err))?;

    let kind = Endpoint::parse(&args.id)
        .map(|endpoint| endpoint.kind())
        .unwrap_or("unknown");
    let out = CreateOutput {
        id: &args.id,
        kind,
        created: true,
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("created {} pipe {}", out.kind, out.id)
        }
        OutputFormat::Raw => {}
    }
    Ok(SUCCESS)
}
