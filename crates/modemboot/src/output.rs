use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use modemboot_boot::BootReport;
use modemboot_frame::IpcMessage;
use modemboot_transport::ChannelKind;
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

#[derive(Serialize)]
struct MessageOutput {
    channel: ChannelKind,
    sequence: u8,
    ack_sequence: u8,
    group: u8,
    index: u8,
    #[serde(rename = "type")]
    msg_type: u16,
    command: String,
    length: usize,
    payload_hex: String,
    timestamp: String,
}

impl MessageOutput {
    fn new(channel: ChannelKind, msg: &IpcMessage) -> Self {
        Self {
            channel,
            sequence: msg.sequence,
            ack_sequence: msg.ack_sequence,
            group: msg.group,
            index: msg.index,
            msg_type: msg.msg_type,
            command: format!("{:#06x}", msg.command()),
            length: msg.length(),
            payload_hex: hex(&msg.payload),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_message(channel: ChannelKind, msg: &IpcMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&MessageOutput::new(channel, msg)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SEQ", "ACK", "COMMAND", "TYPE", "LEN", "PAYLOAD"])
                .add_row(vec![
                    channel.to_string(),
                    msg.sequence.to_string(),
                    msg.ack_sequence.to_string(),
                    format!("{:#06x}", msg.command()),
                    format!("{:#06x}", msg.msg_type),
                    msg.length().to_string(),
                    payload_preview(&msg.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} seq={} ack={} group={:#04x} index={:#04x} type={:#06x} len={} payload={}",
                channel,
                msg.sequence,
                msg.ack_sequence,
                msg.group,
                msg.index,
                msg.msg_type,
                msg.length(),
                payload_preview(&msg.payload)
            );
        }
        OutputFormat::Raw => print_raw(&msg.payload),
    }
}

#[derive(Serialize)]
struct BootOutput {
    status: &'static str,
    attempts: u32,
    timestamp: String,
}

pub fn print_boot_report(report: &BootReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BootOutput {
            status: "complete",
            attempts: report.attempts,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("baseband boot complete (attempts: {})", report.attempts);
        }
        OutputFormat::Raw => println!("complete"),
    }
}

#[derive(Serialize)]
struct PowerOutput {
    enabled: bool,
}

pub fn print_power(enabled: bool, format: OutputFormat) {
    let state = if enabled { "on" } else { "off" };
    match format {
        OutputFormat::Json => print_json(&PowerOutput { enabled }),
        OutputFormat::Table | OutputFormat::Pretty => println!("baseband power: {state}"),
        OutputFormat::Raw => println!("{state}"),
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => hex(payload),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
