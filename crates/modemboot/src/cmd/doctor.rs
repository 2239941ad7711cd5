use std::path::Path;

use modemboot_boot::BootConfig;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let (config_check, config) = config_check(args.config.as_deref());

    let mut checks = vec![platform_check(), config_check];
    checks.push(path_check("firmware", &config.paths.firmware));
    checks.push(path_check("calibration", &config.paths.calibration));
    checks.push(path_check("serial_port", &config.paths.serial));
    checks.push(path_check("shared_memory", &config.paths.shared_memory));
    checks.push(interface_check(&config.interface));
    checks.push(power_check(&config));
    checks.push(compiled_features_check());

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("modemboot doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => println!("{}", output.overall),
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_check() -> CheckResult {
    if cfg!(target_os = "linux") {
        CheckResult::new("platform", CheckStatus::Pass, "Linux device support compiled in")
    } else {
        CheckResult::new(
            "platform",
            CheckStatus::Fail,
            format!("no device support on {}", std::env::consts::OS),
        )
    }
}

/// Load the configuration, falling back to defaults so the remaining checks
/// still run.
fn config_check(path: Option<&Path>) -> (CheckResult, BootConfig) {
    let Some(path) = path else {
        return (
            CheckResult::new("config", CheckStatus::Info, "no config file, using defaults"),
            BootConfig::default(),
        );
    };
    match BootConfig::from_json_file(path) {
        Ok(config) => (
            CheckResult::new(
                "config",
                CheckStatus::Pass,
                format!("{} loaded", path.display()),
            ),
            config,
        ),
        Err(err) => (
            CheckResult::new("config", CheckStatus::Fail, err.to_string()),
            BootConfig::default(),
        ),
    }
}

fn path_check(name: &str, path: &Path) -> CheckResult {
    match std::fs::metadata(path) {
        Ok(_) => CheckResult::new(name, CheckStatus::Pass, path.display().to_string()),
        Err(err) => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!("{}: {err}", path.display()),
        ),
    }
}

fn interface_check(name: &str) -> CheckResult {
    if !cfg!(target_os = "linux") {
        return CheckResult::new("interface", CheckStatus::Skip, "not applicable");
    }
    if Path::new("/sys/class/net").join(name).exists() {
        CheckResult::new("interface", CheckStatus::Pass, format!("{name} present"))
    } else {
        CheckResult::new(
            "interface",
            CheckStatus::Warn,
            format!("{name} not present (created by the modem driver after boot)"),
        )
    }
}

#[cfg(target_os = "linux")]
fn power_check(config: &BootConfig) -> CheckResult {
    use modemboot_transport::{PowerControl, SysfsPower};

    let mut power = SysfsPower::new(
        config.paths.power_control.clone(),
        config.paths.power_status.clone(),
    );
    match power.is_enabled() {
        Ok(true) => CheckResult::new("power", CheckStatus::Info, "baseband powered on"),
        Ok(false) => CheckResult::new("power", CheckStatus::Info, "baseband powered off"),
        Err(err) => CheckResult::new("power", CheckStatus::Fail, err.to_string()),
    }
}

#[cfg(not(target_os = "linux"))]
fn power_check(_config: &BootConfig) -> CheckResult {
    CheckResult::new("power", CheckStatus::Skip, "not applicable")
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    if cfg!(target_os = "linux") {
        features.push("devices");
    }
    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
