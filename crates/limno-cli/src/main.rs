//! Command-line front end for limno-rs.
//!
//! Wires `limno-core` to a file-backed reading log so measurements can be
//! ingested and queried from a shell. Every command prints JSON on stdout;
//! logs go to stderr and are controlled by `RUST_LOG`.
//!
//! ```bash
//! limno ingest --sensor buoy-1 '2015-07-14T10:08:15-03:00;Tw=20.3;Ta:F=78.29;pH=6.9'
//! limno readings --sensor buoy-1 --parameter water_temperature --page 2
//! limno aggregate --sensor buoy-1 --parameter ph \
//!     --start 2015-07-14T00:00:00Z --end 2015-07-15T00:00:00Z --resolution hour
//! ```
//!
//! `LIMNO_CONFIG` and `LIMNO_DATA` may be set in the environment or in a
//! `.env` file instead of passing `--config` and `--data`.

mod simulator;

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::json;

use limno_core::config::CoreConfig;
use limno_core::ingest::{ParseError, parse_timestamp};
use limno_core::service::{AggregateQuery, MeasurementService, ReadingsQuery};
use limno_core::store::FileStore;
use limno_core::{ParameterId, ReadingId, Resolution, SensorId};

use simulator::MockSensorGenerator;

/// Longest history `simulate` will generate
const MAX_SIMULATED_DAYS: i64 = 3650;

#[derive(Parser)]
#[command(name = "limno")]
#[command(about = "Environmental sensor telemetry store", long_about = None)]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(short, long, env = "LIMNO_CONFIG")]
    config: Option<PathBuf>,

    /// Reading log file
    #[arg(short, long, env = "LIMNO_DATA", default_value = "limno.log")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and store one line, or every line on stdin
    Ingest {
        #[arg(long)]
        sensor: String,
        /// Telemetry line; read from stdin when omitted
        line: Option<String>,
    },
    /// List stored readings, newest first
    Readings {
        #[arg(long)]
        sensor: String,
        #[arg(long)]
        parameter: Option<String>,
        /// Earliest collection instant (ISO-8601 with offset)
        #[arg(long, value_parser = parse_instant)]
        from: Option<DateTime<Utc>>,
        /// Latest collection instant (ISO-8601 with offset)
        #[arg(long, value_parser = parse_instant)]
        to: Option<DateTime<Utc>>,
        /// 1-based page number
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Min/avg/max per hour or day
    Aggregate {
        #[arg(long)]
        sensor: String,
        #[arg(long)]
        parameter: String,
        #[arg(long, value_parser = parse_instant)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_instant)]
        end: DateTime<Utc>,
        /// `hour` or `day`
        #[arg(long, default_value = "hour")]
        resolution: Resolution,
    },
    /// Remove one reading by id
    Delete { id: u64 },
    /// Ingest synthetic readings ending now
    Simulate {
        #[arg(long)]
        sensor: String,
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=MAX_SIMULATED_DAYS))]
        days: u32,
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=24))]
        interval_hours: u32,
    },
    /// Print the active parameter registry
    Parameters,
}

/// Command-line instants use the same forms as telemetry lines.
fn parse_instant(value: &str) -> Result<DateTime<Utc>, ParseError> {
    parse_timestamp(value)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CoreConfig::default(),
    };
    let registry = config
        .registry()
        .context("Invalid parameter registry in config")?;

    if let Commands::Parameters = cli.command {
        return print_json(&registry);
    }

    let store = FileStore::open(&cli.data)
        .with_context(|| format!("Failed to open reading log {}", cli.data.display()))?;
    let service = MeasurementService::new(registry, config.query, store);

    match cli.command {
        Commands::Ingest { sensor, line } => {
            let sensor = SensorId::new(sensor);
            match line {
                Some(line) => {
                    let report = service
                        .ingest(&sensor, &line)
                        .with_context(|| format!("Rejected line {line:?}"))?;
                    print_json(&report)?;
                }
                None => ingest_stdin(&service, &sensor)?,
            }
        }

        Commands::Readings {
            sensor,
            parameter,
            from,
            to,
            page,
            per_page,
        } => {
            let query = ReadingsQuery {
                sensor: SensorId::new(sensor),
                parameter: parameter.map(ParameterId::new),
                from,
                to,
                page,
                per_page,
            };
            let page = service.list(&query).context("Failed to list readings")?;
            print_json(&page)?;
        }

        Commands::Aggregate {
            sensor,
            parameter,
            start,
            end,
            resolution,
        } => {
            let query = AggregateQuery {
                sensor: SensorId::new(sensor),
                parameter: ParameterId::new(parameter),
                start,
                end,
                resolution,
            };
            let report = service
                .aggregate(&query)
                .context("Failed to aggregate readings")?;
            print_json(&report)?;
        }

        Commands::Delete { id } => {
            if !service.delete(ReadingId(id)).context("Failed to delete reading")? {
                bail!("Reading {id} not found");
            }
            print_json(&json!({ "deleted": id }))?;
        }

        Commands::Simulate {
            sensor,
            days,
            interval_hours,
        } => {
            let sensor = SensorId::new(sensor);
            let count = (u64::from(days) * 24 / u64::from(interval_hours)) as usize;
            let lines = MockSensorGenerator::new()
                .generate_history(
                    count,
                    TimeDelta::hours(i64::from(interval_hours)),
                    Utc::now(),
                )
                .context("Simulated range reaches outside the supported calendar")?;

            let mut stored = 0;
            for line in &lines {
                stored += service
                    .ingest(&sensor, line)
                    .with_context(|| format!("Simulated line rejected: {line}"))?
                    .readings
                    .len();
            }
            info!("Simulated {} lines for sensor {}", lines.len(), sensor);
            print_json(&json!({ "lines": lines.len(), "readings": stored }))?;
        }

        Commands::Parameters => {}
    }

    Ok(())
}

/// Ingest every non-blank stdin line, reporting each one on its own.
fn ingest_stdin(service: &MeasurementService<FileStore>, sensor: &SensorId) -> Result<()> {
    let mut rejected = 0;
    let mut total = 0;

    for (number, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        total += 1;

        let report = match service.ingest(sensor, &line) {
            Ok(report) => json!({ "line": number + 1, "readings": report.readings }),
            Err(e) => {
                rejected += 1;
                json!({ "line": number + 1, "error": e.code(), "message": e.to_string() })
            }
        };
        println!("{report}");
    }

    if rejected > 0 {
        warn!("Rejected {} of {} lines", rejected, total);
        bail!("{rejected} of {total} lines rejected");
    }
    Ok(())
}
