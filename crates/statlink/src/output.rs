use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use statlink_client::Event;
use statlink_frame::{Reply, ServerStats};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventBody<'a> {
    Time { unix_millis: i64 },
    FreeSize { bytes: u32 },
    Stats(StatsOutput),
    SetData { text: &'a str },
    Cleared,
    Connected,
    ConnectionError { error: &'a str },
    Disconnected,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct StatsOutput {
    received_bytes: u32,
    sent_bytes: u32,
    received_packets: u32,
    sent_packets: u32,
    uptime_secs: u32,
    clients: u32,
}

impl From<&ServerStats> for StatsOutput {
    fn from(stats: &ServerStats) -> Self {
        Self {
            received_bytes: stats.received_bytes,
            sent_bytes: stats.sent_bytes,
            received_packets: stats.received_packets,
            sent_packets: stats.sent_packets,
            uptime_secs: stats.uptime_secs,
            clients: stats.clients,
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    server: &'a str,
    #[serde(flatten)]
    body: EventBody<'a>,
    received_at: String,
}

impl<'a> EventBody<'a> {
    fn from_event(event: &'a Event) -> Self {
        match event {
            Event::Time(time) => Self::Time {
                unix_millis: time.unix_millis(),
            },
            Event::FreeSize(bytes) => Self::FreeSize { bytes: *bytes },
            Event::Stats(stats) => Self::Stats(stats.into()),
            Event::SetDataReply(text) => Self::SetData { text },
            Event::Cleared => Self::Cleared,
            Event::Connected => Self::Connected,
            Event::ConnectionError(error) => Self::ConnectionError { error },
            Event::Disconnected => Self::Disconnected,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Time { .. } => "time",
            Self::FreeSize { .. } => "free_size",
            Self::Stats(_) => "stats",
            Self::SetData { .. } => "set_data",
            Self::Cleared => "cleared",
            Self::Connected => "connected",
            Self::ConnectionError { .. } => "connection_error",
            Self::Disconnected => "disconnected",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Time { unix_millis } => vec![("unix_millis", unix_millis.to_string())],
            Self::FreeSize { bytes } => vec![("bytes", bytes.to_string())],
            Self::Stats(stats) => vec![
                ("received_bytes", stats.received_bytes.to_string()),
                ("sent_bytes", stats.sent_bytes.to_string()),
                ("received_packets", stats.received_packets.to_string()),
                ("sent_packets", stats.sent_packets.to_string()),
                ("uptime_secs", stats.uptime_secs.to_string()),
                ("clients", stats.clients.to_string()),
            ],
            Self::SetData { text } => vec![("text", (*text).to_string())],
            Self::ConnectionError { error } => vec![("error", (*error).to_string())],
            Self::Cleared | Self::Connected | Self::Disconnected => Vec::new(),
        }
    }
}

/// Print a reply returned by a one-shot request.
pub fn print_reply(reply: Reply, server: &str, format: OutputFormat) {
    let event = match reply {
        Reply::Time(time) => Event::Time(time),
        Reply::FreeSize(bytes) => Event::FreeSize(bytes),
        Reply::Stats(stats) => Event::Stats(stats),
        Reply::SetData(text) => Event::SetDataReply(text),
        Reply::Cleared => Event::Cleared,
    };
    print_event(&event, server, format);
}

pub fn print_event(event: &Event, server: &str, format: OutputFormat) {
    println!("{}", render_event(event, server, format));
}

fn render_event(event: &Event, server: &str, format: OutputFormat) -> String {
    let body = EventBody::from_event(event);
    match format {
        OutputFormat::Json => {
            let name = body.name();
            let out = EventOutput {
                server,
                body,
                received_at: now_unix_millis(),
            };
            serde_json::to_string(&out)
                .unwrap_or_else(|_| format!("{{\"event\":\"{name}\"}}"))
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "FIELD", "VALUE"]);
            let fields = body.fields();
            if fields.is_empty() {
                table.add_row(vec![body.name(), "", ""]);
            }
            for (field, value) in fields {
                table.add_row(vec![body.name().to_string(), field.to_string(), value]);
            }
            table.to_string()
        }
        OutputFormat::Pretty => {
            let mut line = format!("{} server={server}", body.name());
            for (field, value) in body.fields() {
                line.push(' ');
                line.push_str(field);
                line.push('=');
                line.push_str(&value);
            }
            line
        }
    }
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
