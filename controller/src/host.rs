use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Mutex,
};

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser};
use heatd_common::{
    files::{
        ENV_CONFIG, ENV_LOG_FILE, ENV_MAIN_FILE, ENV_MDW_FILE, ENV_OCCUPANCY_FILE,
        ENV_OUTPUT_DIR, ENV_STATE_FILE,
    },
    ConfigError, FeedPaths, MemoryRelay, Relay, RelayConfig, RuntimeConfig, ThermostatController,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    clock::SystemClock,
    control_loop::ControlLoop,
    gpio::{self, SysfsRelay},
    shutdown::{self, ShutdownSignal},
};

const EXIT_CONFIG_INVALID: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "heatd", version, about = "Baseboard heater thermostat daemon")]
struct Cli {
    /// Target indoor temperature in °F
    #[arg(value_name = "SETPOINT", allow_negative_numbers = true)]
    setpoint_f: f32,

    /// Directory holding every feed and state file
    #[arg(long, env = ENV_OUTPUT_DIR, value_name = "DIR")]
    output_dir: PathBuf,

    #[arg(long, env = ENV_MAIN_FILE, value_name = "FILE")]
    indoor_file: PathBuf,

    #[arg(long, env = ENV_MDW_FILE, value_name = "FILE")]
    outdoor_file: PathBuf,

    #[arg(long, env = ENV_OCCUPANCY_FILE, value_name = "FILE")]
    occupancy_file: PathBuf,

    #[arg(long, env = ENV_STATE_FILE, value_name = "FILE")]
    state_file: PathBuf,

    /// JSON runtime config; defaults apply when the file does not exist
    #[arg(long, env = ENV_CONFIG, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log relay commands instead of driving the GPIO line
    #[arg(long)]
    dry_run: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, env = ENV_LOG_FILE, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn feed_paths(&self) -> FeedPaths {
        FeedPaths::in_dir(
            &self.output_dir,
            &self.indoor_file,
            &self.outdoor_file,
            &self.occupancy_file,
            &self.state_file,
        )
    }
}

pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print()?;
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            let _ = err.print();
            if !dry_run_requested(std::env::args()) {
                gpio::release_if_exported(&RelayConfig::default());
            }
            return Ok(ExitCode::from(EXIT_CONFIG_INVALID));
        }
    };

    init_tracing(cli.log_file.as_deref())?;

    let runtime = match load_runtime(&cli) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("{:#}", anyhow::Error::new(err));
            eprintln!("{}", Cli::command().render_usage());
            if !cli.dry_run {
                gpio::release_if_exported(&RelayConfig::default());
            }
            return Ok(ExitCode::from(EXIT_CONFIG_INVALID));
        }
    };

    let (clock, controller) = match build_controller(&runtime) {
        Ok(built) => built,
        Err(err) => {
            error!("{:#}", anyhow::Error::new(err));
            if !cli.dry_run {
                gpio::release_if_exported(&runtime.relay);
            }
            return Ok(ExitCode::from(EXIT_CONFIG_INVALID));
        }
    };

    let paths = cli.feed_paths();
    info!(
        setpoint_f = runtime.settings.setpoint_f,
        hysteresis_f = runtime.settings.hysteresis_f,
        start_hour = runtime.settings.start_hour,
        end_hour = runtime.settings.end_hour,
        outdoor_disable_f = runtime.settings.outdoor_disable_f,
        dry_run = cli.dry_run,
        "heatd starting"
    );
    info!(
        indoor = %paths.indoor.display(),
        outdoor = %paths.outdoor.display(),
        occupancy = %paths.occupancy.display(),
        state = %paths.state.display(),
        "feed paths"
    );

    let (trigger, signal) = shutdown::channel();
    shutdown::spawn_signal_listener(trigger).context("failed to install signal handlers")?;

    if cli.dry_run {
        drive(ControlLoop::new(controller, MemoryRelay::new(), clock, paths), signal).await?;
    } else {
        let relay = SysfsRelay::open(&runtime.relay).with_context(|| {
            format!("failed to open heater relay on gpio{}", runtime.relay.gpio_pin)
        })?;
        drive(ControlLoop::new(controller, relay, clock, paths), signal).await?;
    }

    Ok(ExitCode::SUCCESS)
}

async fn drive<R: Relay>(
    mut control: ControlLoop<R, SystemClock>,
    signal: ShutdownSignal,
) -> anyhow::Result<()> {
    if let Err(err) = control.start().await {
        control.shutdown().await;
        return Err(err).context("failed to arm heater relay");
    }
    control.run(signal).await;
    info!(state = ?control.state(), "control loop finished");
    Ok(())
}

/// Whether `--dry-run` appears in arguments clap could not parse.
fn dry_run_requested(args: impl IntoIterator<Item = String>) -> bool {
    args.into_iter().skip(1).any(|arg| arg == "--dry-run")
}

/// Config file merged with the command-line setpoint, then validated.
fn load_runtime(cli: &Cli) -> Result<RuntimeConfig, ConfigError> {
    let mut runtime = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    runtime.settings.setpoint_f = cli.setpoint_f;
    runtime.validate()?;
    Ok(runtime)
}

fn build_controller(
    runtime: &RuntimeConfig,
) -> Result<(SystemClock, ThermostatController), ConfigError> {
    let clock = SystemClock::from_timezone(runtime.timezone.as_deref())?;
    let controller =
        ThermostatController::new(runtime.thermostat.clone(), runtime.settings.clone())?;
    Ok((clock, controller))
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
