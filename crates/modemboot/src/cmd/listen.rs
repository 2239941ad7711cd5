use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use modemboot_frame::{FrameError, IpcMessage, MessageChannel};
use modemboot_transport::Transport;
use tracing::warn;

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, CliResult};
use crate::output::OutputFormat;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[cfg(target_os = "linux")]
pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    use std::sync::Arc;

    use modemboot_transport::{ChannelConfig, ChannelKind, PhonetChannel};

    use crate::exit::{transport_error, SUCCESS};
    use crate::output::print_message;

    let kind = ChannelKind::from(args.channel);
    let mut config = ChannelConfig::default();
    if let Some(name) = &args.interface {
        config.interface = name.clone();
    }
    let link = PhonetChannel::open(kind, &config)
        .map_err(|err| transport_error("channel open failed", err))?;
    let mut channel = MessageChannel::new(link, kind);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    receive_loop(&mut channel, &running, args.count, |msg| {
        print_message(kind, msg, format)
    })?;
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: ListenArgs, _format: OutputFormat) -> CliResult<i32> {
    Err(crate::exit::unsupported("listen"))
}

/// Receive until `running` clears or `count` messages were handled.
///
/// Malformed datagrams are logged and skipped; transport failures end the loop.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn receive_loop<T: Transport>(
    channel: &mut MessageChannel<T>,
    running: &AtomicBool,
    count: Option<usize>,
    mut on_message: impl FnMut(&IpcMessage),
) -> CliResult<usize> {
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        if count.is_some_and(|count| printed >= count) {
            break;
        }
        match channel.recv_timeout(POLL_INTERVAL) {
            Ok(Some(msg)) => {
                on_message(&msg);
                printed = printed.saturating_add(1);
            }
            Ok(None) => {}
            Err(FrameError::Transport(err)) => {
                return Err(frame_error("receive failed", FrameError::Transport(err)));
            }
            Err(err) => warn!(error = %err, channel = %channel.kind(), "dropping malformed frame"),
        }
    }

    Ok(printed)
}

#[cfg(target_os = "linux")]
fn install_ctrlc_handler(running: std::sync::Arc<AtomicBool>) -> CliResult<()> {
    use crate::exit::{CliError, INTERNAL};

    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
