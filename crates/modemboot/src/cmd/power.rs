use crate::cmd::PowerArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

#[cfg(target_os = "linux")]
pub fn run(args: PowerArgs, format: OutputFormat) -> CliResult<i32> {
    use modemboot_boot::constants::{DEFAULT_POWER_CONTROL_PATH, DEFAULT_POWER_STATUS_PATH};
    use modemboot_transport::{PowerControl, SysfsPower};

    use crate::cmd::PowerAction;
    use crate::exit::{transport_error, SUCCESS};
    use crate::output::print_power;

    let mut power = SysfsPower::new(
        args.control
            .unwrap_or_else(|| DEFAULT_POWER_CONTROL_PATH.into()),
        args.status
            .unwrap_or_else(|| DEFAULT_POWER_STATUS_PATH.into()),
    );

    match args.action {
        PowerAction::On => power
            .power_on()
            .map_err(|err| transport_error("power on failed", err))?,
        PowerAction::Off => power
            .power_off()
            .map_err(|err| transport_error("power off failed", err))?,
        PowerAction::Status => {}
    }

    let enabled = power
        .is_enabled()
        .map_err(|err| transport_error("status read failed", err))?;
    print_power(enabled, format);
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: PowerArgs, _format: OutputFormat) -> CliResult<i32> {
    Err(crate::exit::unsupported("power"))
}
