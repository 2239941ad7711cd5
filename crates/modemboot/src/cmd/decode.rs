use modemboot_frame::{ChannelCodec, FrameConfig, IpcMessage};
use modemboot_transport::ChannelKind;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let kind = ChannelKind::from(args.channel);
    let bytes = std::fs::read(&args.path)
        .map_err(|err| io_error(&format!("failed reading {}", args.path.display()), err))?;
    let msg = decode_bytes(kind, &bytes, args.max_frame_size)?;
    print_message(kind, &msg, format);
    Ok(SUCCESS)
}

fn decode_bytes(kind: ChannelKind, bytes: &[u8], max: Option<usize>) -> CliResult<IpcMessage> {
    let mut config = FrameConfig::default();
    if let Some(max) = max {
        config.max_frame_size = max;
    }
    ChannelCodec::with_config(kind, config)
        .decode(bytes)
        .map_err(|err| frame_error("decode failed", err))
}

#[cfg(test)]
mod tests {
    use modemboot_frame::{encode_rfs, GROUP_RFS, MAX_MODEM_DATA_SIZE};

    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn decodes_rfs_capture() {
        let wire = encode_rfs(
            &IpcMessage::new(0, 0x11, b"open".to_vec()).with_sequence(4),
            MAX_MODEM_DATA_SIZE,
        )
        .expect("message should encode");
        let msg = decode_bytes(ChannelKind::Rfs, &wire, None).expect("capture should decode");
        assert_eq!(msg.group, GROUP_RFS);
        assert_eq!(msg.ack_sequence, 4);
    }

    #[test]
    fn frame_above_limit_is_data_invalid() {
        let wire = encode_rfs(&IpcMessage::new(0, 1, vec![0; 32]), MAX_MODEM_DATA_SIZE)
            .expect("message should encode");
        let err = decode_bytes(ChannelKind::Rfs, &wire, Some(16))
            .expect_err("oversized frame should fail");
        assert_eq!(err.code, DATA_INVALID);
    }
}
