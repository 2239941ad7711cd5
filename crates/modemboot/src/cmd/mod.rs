use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use modemboot_transport::ChannelKind;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod boot;
pub mod decode;
pub mod doctor;
pub mod listen;
pub mod power;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Power-cycle the baseband and run the full boot sequence.
    Boot(BootArgs),
    /// Query or switch baseband power.
    Power(PowerArgs),
    /// Send a single message on a baseband channel.
    Send(SendArgs),
    /// Print messages received on a baseband channel.
    Listen(ListenArgs),
    /// Decode a captured frame from a file.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Boot(args) => boot::run(args, format),
        Command::Power(args) => power::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
    }
}

/// Channel selector as accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChannelArg {
    Fmt,
    Rfs,
}

impl From<ChannelArg> for ChannelKind {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Fmt => ChannelKind::Fmt,
            ChannelArg::Rfs => ChannelKind::Rfs,
        }
    }
}

#[derive(Args, Debug)]
pub struct BootArgs {
    /// JSON boot configuration. Flags below override its values.
    #[arg(long, value_name = "FILE", env = "MODEMBOOT_CONFIG")]
    pub config: Option<PathBuf>,
    /// Firmware image (block device or file).
    #[arg(long, value_name = "PATH")]
    pub firmware: Option<PathBuf>,
    /// Calibration data (block device or file).
    #[arg(long, value_name = "PATH")]
    pub calibration: Option<PathBuf>,
    /// Boot serial port.
    #[arg(long, value_name = "PATH")]
    pub serial: Option<PathBuf>,
    /// Shared memory device.
    #[arg(long, value_name = "PATH")]
    pub shared_memory: Option<PathBuf>,
    /// Network interface taken down before power cycling.
    #[arg(long, value_name = "NAME")]
    pub interface: Option<String>,
    /// Maximum number of boot attempts.
    #[arg(long, value_name = "N")]
    pub attempts: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PowerAction {
    On,
    Off,
    Status,
}

#[derive(Args, Debug)]
pub struct PowerArgs {
    /// Action to perform.
    #[arg(value_enum, default_value = "status")]
    pub action: PowerAction,
    /// Modem control file.
    #[arg(long, value_name = "PATH")]
    pub control: Option<PathBuf>,
    /// Modem status file.
    #[arg(long, value_name = "PATH")]
    pub status: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel to send on.
    #[arg(long, short = 'c', value_enum, default_value = "fmt")]
    pub channel: ChannelArg,
    /// Network interface carrying the channels.
    #[arg(long, value_name = "NAME")]
    pub interface: Option<String>,
    /// Command group.
    #[arg(long, value_parser = parse_u8)]
    pub group: u8,
    /// Command index within the group.
    #[arg(long, value_parser = parse_u8)]
    pub index: u8,
    /// Request/response type.
    #[arg(long = "type", value_parser = parse_u16, default_value = "0")]
    pub msg_type: u16,
    /// Sequence number.
    #[arg(long, value_parser = parse_u8, default_value = "0")]
    pub seq: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one response message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel to listen on.
    #[arg(long, short = 'c', value_enum, default_value = "fmt")]
    pub channel: ChannelArg,
    /// Network interface carrying the channels.
    #[arg(long, value_name = "NAME")]
    pub interface: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Channel layout of the captured frame.
    #[arg(long, short = 'c', value_enum, default_value = "fmt")]
    pub channel: ChannelArg,
    /// File holding one encoded frame.
    pub path: PathBuf,
    /// Largest frame accepted.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// JSON boot configuration to check.
    #[arg(long, value_name = "FILE", env = "MODEMBOOT_CONFIG")]
    pub config: Option<PathBuf>,
}

fn parse_number(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_number(input)?;
    u8::try_from(value).map_err(|_| format!("{input} does not fit in 8 bits"))
}

fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_number(input)?;
    u16::try_from(value).map_err(|_| format!("{input} does not fit in 16 bits"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    use std::time::Duration;

    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
