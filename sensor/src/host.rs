use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, Subcommand, ValueEnum};
use heatd_common::{
    feed::{occupancy_line, sensor_line, write_line_atomic},
    files::{self, ENV_OCCUPANCY_FILE, ENV_STATE_FILE},
    ControllerStatus, OccupancyState, Station, TIMESTAMP_FORMAT,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "heatd-feed")]
#[command(about = "Write heatd feed files and inspect its published state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replace a station's temperature feed with one reading
    Reading {
        /// MAIN, GEORGE, MBR or MDW
        #[arg(long)]
        station: Station,
        /// Temperature in °F
        #[arg(allow_negative_numbers = true)]
        value_f: f32,
        /// Observation time, e.g. "Sun, 18 Oct 2026 10:53:00 -0500" (default: now)
        #[arg(long, value_parser = parse_timestamp)]
        observed_at: Option<DateTime<FixedOffset>>,
        /// Feed file (default: the station's configured file)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the occupancy feed
    Occupancy {
        presence: Presence,
        /// Feed file (default: HK_SWITCH_OUTPUT_FILE)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse the published state record and print it
    Status {
        /// State file (default: HEATER_STATE_FILE)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Presence {
    Home,
    Away,
}

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now = Local::now().fixed_offset();

    match cli.command {
        Commands::Reading {
            station,
            value_f,
            observed_at,
            output,
        } => {
            let path = output_or_env(output, station.env_key())?;
            write_reading(&path, station, value_f, &observed_at.unwrap_or(now))?;
            info!(%station, value_f, path = %path.display(), "reading written");
        }
        Commands::Occupancy { presence, output } => {
            let path = output_or_env(output, ENV_OCCUPANCY_FILE)?;
            let state = OccupancyState {
                home: presence == Presence::Home,
            };
            write_line_atomic(&path, &occupancy_line(state, &now))
                .with_context(|| format!("failed to write occupancy feed {}", path.display()))?;
            info!(home = state.home, path = %path.display(), "occupancy written");
        }
        Commands::Status { input, json } => {
            let path = output_or_env(input, ENV_STATE_FILE)?;
            let status = read_status(&path)?;
            println!("{}", render_status(&status, json)?);
        }
    }
    Ok(())
}

fn output_or_env(explicit: Option<PathBuf>, env_key: &str) -> anyhow::Result<PathBuf> {
    match explicit.or_else(|| files::path_from_env(env_key)) {
        Some(path) => Ok(path),
        None => bail!("no file given: pass a path or set {env_key}"),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map_err(|err| format!("expected `{TIMESTAMP_FORMAT}`: {err}"))
}

fn write_reading(
    path: &Path,
    station: Station,
    value_f: f32,
    observed_at: &DateTime<FixedOffset>,
) -> anyhow::Result<()> {
    ensure!(value_f.is_finite(), "temperature must be a finite number");
    write_line_atomic(path, &sensor_line(value_f, observed_at, Some(station)))
        .with_context(|| format!("failed to write {station} feed {}", path.display()))
}

fn read_status(path: &Path) -> anyhow::Result<ControllerStatus> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let line = raw.lines().next().unwrap_or_default();
    line.parse()
        .with_context(|| format!("state file {} is not a status record", path.display()))
}

fn render_status(status: &ControllerStatus, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(status)?)
    } else {
        Ok(status.to_string())
    }
}
