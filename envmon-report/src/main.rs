use std::path::PathBuf;

use clap::{Parser, Subcommand};
use envmon_core::catalog::{Pm25Level, SensorType};
use envmon_core::{GroupId, MonitorId, MonitorType, Period, Status};
use envmon_report::config::{Config, SourceConfig};
use envmon_report::export::{self, MONITOR_FIELDS};
use envmon_report::registry::filter::MonitorFilter;
use envmon_report::registry::memory::InMemoryRegistry;
use envmon_report::{Axis, ReportService};
use jiff::Timestamp;
use jiff::civil::Date;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "envmon-report")]
#[command(about = "Environmental monitor reports")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "envmon-report.toml")]
    config: PathBuf,

    /// Snapshot file to read from, overriding the configured source
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hourly grid of one monitor-type across several monitors
    Daily {
        #[arg(long)]
        monitor_type: String,
        #[arg(long, value_delimiter = ',', required = true)]
        monitors: Vec<String>,
        #[arg(long)]
        date: Date,
    },
    /// Hourly grid of several monitor-types of one monitor
    DailyByType {
        #[arg(long)]
        monitor: String,
        #[arg(long, value_delimiter = ',', required = true)]
        types: Vec<String>,
        #[arg(long)]
        date: Date,
    },
    /// Dates by hours grid of one monitor-type for a month
    Monthly {
        #[arg(long)]
        monitor: String,
        #[arg(long)]
        monitor_type: String,
        #[arg(long)]
        year: i16,
        #[arg(long)]
        month: i8,
    },
    /// Quartile summaries across a set of peer monitors
    Quartile {
        #[arg(long)]
        monitor_type: String,
        #[arg(long, value_delimiter = ',', required = true)]
        peers: Vec<String>,
        #[arg(long)]
        start: Timestamp,
        #[arg(long)]
        end: Timestamp,
    },
    /// Effective rate of one monitor-type over a period
    Rate {
        #[arg(long)]
        monitor: String,
        #[arg(long)]
        monitor_type: String,
        #[arg(long)]
        start: Timestamp,
        #[arg(long)]
        end: Timestamp,
    },
    /// Per-county status counts of a monitor group
    Group {
        #[arg(long)]
        group: String,
        #[arg(long)]
        start: Timestamp,
        #[arg(long)]
        end: Timestamp,
    },
    /// List monitors, optionally filtered
    Monitors {
        #[arg(long)]
        county: Option<String>,
        #[arg(long)]
        district: Option<String>,
        /// Sensor-type code, e.g. TR
        #[arg(long)]
        sensor_type: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        enabled_only: bool,
        /// Error-filter code: disconnect, lt95, constant, powerError or noPowerInfo
        #[arg(long, requires_all = ["start", "end"])]
        status: Option<String>,
        /// PM2.5 level code: -1, 25 or 50
        #[arg(long, allow_hyphen_values = true, requires_all = ["start", "end"])]
        pm25: Option<String>,
        /// Period the status and PM2.5 filters look at
        #[arg(long)]
        start: Option<Timestamp>,
        #[arg(long)]
        end: Option<Timestamp>,
        /// Print CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tracing=info,envmon_report=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    let snapshot = match (&cli.snapshot, &config.source) {
        (Some(path), _) => Some(path.clone()),
        (None, SourceConfig::Snapshot { path }) => Some(path.clone()),
        (None, SourceConfig::Memory) => None,
    };
    let registry = match snapshot {
        Some(path) => {
            info!(path = ?path, "Loading snapshot");
            InMemoryRegistry::load_snapshot(&path).await?
        }
        None => {
            info!("Using an empty in-memory registry");
            InMemoryRegistry::new()
        }
    };

    let cancel = CancellationToken::new();
    let service = ReportService::new(registry, config).with_cancellation(cancel.clone());

    tokio::select! {
        result = run(&service, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, cancelling...");
            cancel.cancel();
            Ok(())
        }
    }
}

async fn run(
    service: &ReportService<InMemoryRegistry>,
    command: Command,
) -> color_eyre::Result<()> {
    match command {
        Command::Daily {
            monitor_type,
            monitors,
            date,
        } => {
            let axis = Axis::Monitors {
                monitor_type: monitor_type.into(),
                monitors: monitors.into_iter().map(MonitorId::from).collect(),
            };
            print_json(&service.generate_daily_report(&axis, date).await?)
        }
        Command::DailyByType {
            monitor,
            types,
            date,
        } => {
            let axis = Axis::MonitorTypes {
                monitor: monitor.into(),
                types: types.into_iter().map(MonitorType::from).collect(),
            };
            print_json(&service.generate_daily_report(&axis, date).await?)
        }
        Command::Monthly {
            monitor,
            monitor_type,
            year,
            month,
        } => {
            let report = service
                .generate_monthly_hour_report(&monitor.into(), &monitor_type.into(), year, month)
                .await?;
            print_json(&report)
        }
        Command::Quartile {
            monitor_type,
            peers,
            start,
            end,
        } => {
            let peers: Vec<MonitorId> = peers.into_iter().map(MonitorId::from).collect();
            let set = service
                .compute_quartile_report(&monitor_type.into(), Period::new(start, end), &peers)
                .await?;
            print_json(&set)
        }
        Command::Rate {
            monitor,
            monitor_type,
            start,
            end,
        } => {
            let period = Period::new(start, end);
            let monitor = MonitorId::from(monitor);
            match service
                .compute_effective_rate(&monitor, &monitor_type.into(), period)
                .await
            {
                Ok(rate) => print_json(&rate),
                Err(err) => match err.fallback_rate() {
                    Some(rate) => {
                        tracing::warn!(error = %err, "reporting fallback rate");
                        print_json(&rate)
                    }
                    None => Err(err.into()),
                },
            }
        }
        Command::Group { group, start, end } => {
            let summary = service
                .generate_group_summary(&GroupId::from(group), Period::new(start, end))
                .await?;
            print_json(&summary)
        }
        Command::Monitors {
            county,
            district,
            sensor_type,
            tag,
            enabled_only,
            status,
            pm25,
            start,
            end,
            csv,
        } => {
            let mut filter = build_filter(county, district, sensor_type, tag, enabled_only)?;
            if let Some(code) = status {
                filter.status = Some(
                    Status::from_filter_code(&code)
                        .ok_or_else(|| color_eyre::eyre::eyre!("unknown status filter {code}"))?,
                );
            }
            if let Some(code) = pm25 {
                filter.pm25 = Some(
                    Pm25Level::from_code(&code)
                        .ok_or_else(|| color_eyre::eyre::eyre!("unknown PM2.5 level {code}"))?,
                );
            }
            if let (Some(start), Some(end)) = (start, end) {
                filter.period = Some(Period::new(start, end));
            }
            let monitors = service.list_monitors(&filter).await?;
            if csv {
                print!("{}", export::to_csv(&monitors, MONITOR_FIELDS));
                Ok(())
            } else {
                print_json(&monitors)
            }
        }
    }
}

fn build_filter(
    county: Option<String>,
    district: Option<String>,
    sensor_type: Option<String>,
    tag: Option<String>,
    enabled_only: bool,
) -> color_eyre::Result<MonitorFilter> {
    let mut builder = MonitorFilter::builder();
    if let Some(county) = county {
        builder = builder.county(county);
    }
    if let Some(district) = district {
        builder = builder.district(district);
    }
    if let Some(code) = sensor_type {
        let sensor_type = SensorType::from_code(&code)
            .ok_or_else(|| color_eyre::eyre::eyre!("unknown sensor type {code}"))?;
        builder = builder.sensor_type(sensor_type);
    }
    if let Some(tag) = tag {
        builder = builder.tag(tag);
    }
    if enabled_only {
        builder = builder.enabled_only();
    }
    Ok(builder.build())
}

fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
