use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mfpipe_frame::{Message, Payload};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Something taken off a pipe's read queue.
#[derive(Debug)]
pub enum Received {
    Payload(Payload),
    Message(Message),
}

#[derive(Serialize, Default)]
struct EntryOutput<'a> {
    channel: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<[i64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_props: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<&'a str>,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    timestamp: String,
}

impl<'a> EntryOutput<'a> {
    fn new(channel: &'a str, received: &'a Received) -> Self {
        let base = Self {
            channel,
            timestamp: now_unix_seconds(),
            ..Self::default()
        };
        match received {
            Received::Payload(Payload::Buffer(buffer)) => Self {
                kind: "buffer",
                flags: Some(buffer.flags.bits()),
                size: buffer.data.len(),
                data: Some(data_preview(&buffer.data)),
                ..base
            },
            Received::Payload(Payload::Frame(frame)) => Self {
                kind: "frame",
                time: Some([frame.time.start, frame.time.end]),
                user_props: Some(&frame.user_props),
                size: frame.video.len() + frame.audio.len(),
                data: Some(data_preview(&frame.video)),
                ..base
            },
            Received::Message(message) => Self {
                kind: "message",
                name: Some(&message.name),
                param: Some(&message.param),
                size: message.name.len() + message.param.len(),
                ..base
            },
        }
    }
}

pub fn print_received(channel: &str, received: &Received, format: OutputFormat) {
    if let OutputFormat::Raw = format {
        match received {
            Received::Payload(Payload::Buffer(buffer)) => print_raw(&buffer.data),
            Received::Payload(Payload::Frame(frame)) => {
                print_raw(&frame.video);
                print_raw(&frame.audio);
            }
            Received::Message(message) => {
                print_raw(format!("{}={}\n", message.name, message.param).as_bytes())
            }
        }
        return;
    }

    let out = EntryOutput::new(channel, received);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let detail = match received {
                Received::Message(message) => format!("{}={}", message.name, message.param),
                Received::Payload(_) => out.data.clone().unwrap_or_default(),
            };
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "KIND", "SIZE", "DATA"])
                .add_row(vec![
                    display_channel(channel).to_string(),
                    out.kind.to_string(),
                    out.size.to_string(),
                    detail,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match received {
            Received::Message(message) => println!(
                "channel={} message name={} param={}",
                display_channel(channel),
                message.name,
                message.param
            ),
            Received::Payload(_) => println!(
                "channel={} {} size={} data={}",
                display_channel(channel),
                out.kind,
                out.size,
                out.data.as_deref().unwrap_or_default()
            ),
        },
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn display_channel(channel: &str) -> &str {
    if channel.is_empty() {
        "(default)"
    } else {
        channel
    }
}

fn data_preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", data.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use mfpipe_frame::{Buffer, BufferFlags};

    use super::*;

    #[test]
    fn buffer_output_fields() {
        let received = Received::Payload(Buffer::new(BufferFlags::BUFFER, "hello").into());
        let value = serde_json::to_value(EntryOutput::new("ch1", &received)).unwrap();
        assert_eq!(value["channel"], "ch1");
        assert_eq!(value["kind"], "buffer");
        assert_eq!(value["flags"], 1);
        assert_eq!(value["data"], "hello");
        assert!(value.get("name").is_none());
    }

    #[test]
    fn message_output_fields() {
        let received = Received::Message(Message::new("evt", "param"));
        let value = serde_json::to_value(EntryOutput::new("", &received)).unwrap();
        assert_eq!(value["kind"], "message");
        assert_eq!(value["name"], "evt");
        assert_eq!(value["param"], "param");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn binary_data_is_summarised() {
        assert_eq!(data_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
        assert_eq!(display_channel(""), "(default)");
    }
}
