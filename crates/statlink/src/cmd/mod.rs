use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use statlink_client::ClientConfig;
use statlink_frame::{CLEAR_DATA, GET_SIZE, GET_STAT, GET_TIME};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod request;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask the server for its current time.
    Time,
    /// Ask the server how many bytes it has free.
    Size,
    /// Ask the server for traffic and uptime counters.
    Stat,
    /// Store text on the server and print its reply.
    SetData(SetDataArgs),
    /// Clear data stored on the server.
    Clear,
    /// Print every event from the server until interrupted.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where and how to reach the server.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub timeout: String,
}

impl Target {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }

    pub fn client_config(&self) -> CliResult<ClientConfig> {
        Ok(ClientConfig {
            connect_timeout: self.timeout()?,
            ..ClientConfig::default()
        })
    }
}

pub fn run(command: Command, target: &Target, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Time => request::run(RequestKind::Time, target, format),
        Command::Size => request::run(RequestKind::Size, target, format),
        Command::Stat => request::run(RequestKind::Stat, target, format),
        Command::SetData(args) => request::run_set_data(&args.text, target, format),
        Command::Clear => request::run(RequestKind::Clear, target, format),
        Command::Watch(args) => watch::run(args, target, format),
        Command::Version(args) => version::run(args),
    }
}

/// Payload-less request kinds selectable on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RequestKind {
    Time,
    Size,
    Stat,
    Clear,
}

impl RequestKind {
    pub fn type_tag(self) -> u16 {
        match self {
            RequestKind::Time => GET_TIME,
            RequestKind::Size => GET_SIZE,
            RequestKind::Stat => GET_STAT,
            RequestKind::Clear => CLEAR_DATA,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetDataArgs {
    /// Text to store.
    pub text: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Requests to send (comma-separated), once at start and then every --every.
    #[arg(long, value_delimiter = ',')]
    pub request: Vec<RequestKind>,
    /// Resend the requests at this interval (e.g. 2s, 500ms).
    #[arg(long, value_name = "DURATION", requires = "request")]
    pub every: Option<String>,
    /// Exit after printing N replies.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
