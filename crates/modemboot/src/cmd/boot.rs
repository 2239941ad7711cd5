use modemboot_boot::BootConfig;

use crate::cmd::BootArgs;
use crate::exit::{boot_error, CliResult};
use crate::output::OutputFormat;

#[cfg(target_os = "linux")]
pub fn run(args: BootArgs, format: OutputFormat) -> CliResult<i32> {
    use modemboot_boot::{Bootstrapper, HardwarePlatform};

    use crate::exit::SUCCESS;
    use crate::output::print_boot_report;

    let config = load_config(&args)?;
    let platform = HardwarePlatform::from_config(&config);
    let mut bootstrapper =
        Bootstrapper::new(platform, config).map_err(|err| boot_error("invalid config", err))?;
    let report = bootstrapper
        .boot()
        .map_err(|err| boot_error("boot failed", err))?;
    print_boot_report(&report, format);
    Ok(SUCCESS)
}

#[cfg(not(target_os = "linux"))]
pub fn run(args: BootArgs, _format: OutputFormat) -> CliResult<i32> {
    load_config(&args)?;
    Err(crate::exit::unsupported("boot"))
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(args: &BootArgs) -> CliResult<BootConfig> {
    let mut config = match &args.config {
        Some(path) => {
            BootConfig::from_json_file(path).map_err(|err| boot_error("invalid config", err))?
        }
        None => BootConfig::default(),
    };

    if let Some(path) = &args.firmware {
        config.paths.firmware = path.clone();
    }
    if let Some(path) = &args.calibration {
        config.paths.calibration = path.clone();
    }
    if let Some(path) = &args.serial {
        config.paths.serial = path.clone();
    }
    if let Some(path) = &args.shared_memory {
        config.paths.shared_memory = path.clone();
    }
    if let Some(name) = &args.interface {
        config.interface = name.clone();
    }
    if let Some(attempts) = args.attempts {
        config.timing.max_attempts = attempts;
    }

    config
        .validate()
        .map_err(|err| boot_error("invalid config", err))?;
    Ok(config)
}
