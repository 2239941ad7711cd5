use std::fs;
use std::time::Duration;

use modemboot_frame::{IpcMessage, MessageChannel};
use modemboot_transport::Transport;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, TIMEOUT};
use crate::output::OutputFormat;

#[cfg(target_os = "linux")]
pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    use modemboot_transport::{ChannelConfig, ChannelKind, PhonetChannel};

    use crate::exit::{transport_error, SUCCESS};
    use crate::output::print_message;

    let wait = args.wait.then(|| parse_duration(&args.timeout)).transpose()?;
    let message = build_message(&args)?;
    let kind = ChannelKind::from(args.channel);

    let mut config = ChannelConfig::default();
    if let Some(name) = &args.interface {
        config.interface = name.clone();
    }
    let link = PhonetChannel::open(kind, &config)
        .map_err(|err| transport_error("channel open failed", err))?;
    let mut channel = MessageChannel::new(link, kind);

    if let Some(response) = exchange(&mut channel, &message, wait)? {
        print_message(kind, &response, format);
    }
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(args: SendArgs, _format: OutputFormat) -> CliResult<i32> {
    if args.wait {
        parse_duration(&args.timeout)?;
    }
    build_message(&args)?;
    Err(crate::exit::unsupported("send"))
}

fn build_message(args: &SendArgs) -> CliResult<IpcMessage> {
    let payload = resolve_payload(args)?;
    Ok(IpcMessage::new(args.group, args.index, payload)
        .with_sequence(args.seq)
        .with_type(args.msg_type))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// Send `message` and, when `wait` is set, block for one response.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn exchange<T: Transport>(
    channel: &mut MessageChannel<T>,
    message: &IpcMessage,
    wait: Option<Duration>,
) -> CliResult<Option<IpcMessage>> {
    channel
        .send(message)
        .map_err(|err| frame_error("send failed", err))?;

    let Some(timeout) = wait else {
        return Ok(None);
    };
    match channel
        .recv_timeout(timeout)
        .map_err(|err| frame_error("receive failed", err))?
    {
        Some(response) => Ok(Some(response)),
        None => Err(CliError::new(
            TIMEOUT,
            format!("no response within {timeout:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use modemboot_frame::{encode_fmt, MAX_MODEM_DATA_SIZE};
    use modemboot_transport::mock::MockTransport;
    use modemboot_transport::ChannelKind;

    use super::*;
    use crate::cmd::ChannelArg;

    fn args() -> SendArgs {
        SendArgs {
            channel: ChannelArg::Fmt,
            interface: None,
            group: 0x05,
            index: 0x01,
            msg_type: 0x0001,
            seq: 7,
            data: Some("hello".to_string()),
            file: None,
            wait: false,
            timeout: "5s".to_string(),
        }
    }

    #[test]
    fn builds_message_from_flags() {
        let msg = build_message(&args()).expect("message should build");
        assert_eq!(msg.command(), 0x0501);
        assert_eq!(msg.sequence, 7);
        assert_eq!(msg.msg_type, 1);
        assert_eq!(msg.payload.as_ref(), b"hello");
    }

    #[test]
    fn missing_payload_file_is_reported() {
        let err = build_message(&SendArgs {
            data: None,
            file: Some(std::path::PathBuf::from("/nonexistent/modemboot-payload")),
            ..args()
        })
        .expect_err("missing file should fail");
        assert_eq!(err.code, crate::exit::DEVICE_UNAVAILABLE);
    }

    #[test]
    fn exchange_returns_response_when_waiting() {
        let request = build_message(&args()).expect("message should build");
        let reply = IpcMessage::new(0x05, 0x01, b"ok".to_vec()).with_ack_sequence(7);
        let wire = encode_fmt(&reply, MAX_MODEM_DATA_SIZE).expect("reply should encode");
        let transport = MockTransport::new().respond_after(1, wire.to_vec());
        let handle = transport.handle();
        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);

        let response = exchange(&mut channel, &request, Some(Duration::from_millis(10)))
            .expect("exchange should succeed");
        assert_eq!(response, Some(reply));
        assert_eq!(handle.writes().len(), 1);
    }

    #[test]
    fn exchange_without_wait_skips_receive() {
        let request = build_message(&args()).expect("message should build");
        let transport = MockTransport::new();
        let handle = transport.handle();
        let mut channel = MessageChannel::new(transport, ChannelKind::Fmt);

        let response = exchange(&mut channel, &request, None).expect("send should succeed");
        assert!(response.is_none());
        assert_eq!(handle.read_calls(), 0);
    }

    #[test]
    fn exchange_times_out_without_response() {
        let request = build_message(&args()).expect("message should build");
        let mut channel = MessageChannel::new(MockTransport::new(), ChannelKind::Fmt);

        let err = exchange(&mut channel, &request, Some(Duration::from_millis(10)))
            .expect_err("silent channel should time out");
        assert_eq!(err.code, TIMEOUT);
    }
}
