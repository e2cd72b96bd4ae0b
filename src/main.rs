//! VNS Sessions CLI
//!
//! Convert raw recording files into the parquet store and inspect the
//! resulting tables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use polars::prelude::{DataFrame, NamedFrom, Series};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vns_sessions::{
    catalog,
    config::Config,
    core::aggregate::{latency_records, latency_summary, SessionGroups, TrialTypeLabels},
    core::schema::TrialSchema,
    session::{session_summary, Experiment},
    store::SessionStore,
    VERSION,
};

#[cfg(feature = "plots")]
use vns_sessions::{
    catalog::SessionId,
    core::aggregate::rolling_success_rate,
    core::units::{FixationWindow, Seconds},
};

#[derive(Parser)]
#[command(name = "vns-sessions")]
#[command(version = VERSION)]
#[command(about = "Session/trial pipeline for VNS behavioral recordings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List raw recordings in a directory
    Scan {
        /// Directory holding raw .mat recordings
        dir: Option<PathBuf>,
    },

    /// Convert raw recordings into the parquet store
    Convert {
        /// Directory holding raw .mat recordings
        dir: Option<PathBuf>,

        /// Store root (defaults to the configured data root)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build and print the cross-session summary table
    Summary {
        /// Store root
        #[arg(long)]
        store: Option<PathBuf>,

        /// JSON document assigning sessions to treatment groups
        #[arg(long)]
        groups: Option<PathBuf>,
    },

    /// Collect outcome latencies across all stored sessions
    Latency {
        /// Store root
        #[arg(long)]
        store: Option<PathBuf>,

        /// JSON code table mapping trial-type codes to labels
        #[arg(long)]
        codes: Option<PathBuf>,
    },

    /// Render a chart to an HTML file (requires the plots feature)
    Plot {
        /// Chart kind: rolling, latency or cursor
        kind: String,

        /// Session directory name (rolling and cursor charts)
        #[arg(long)]
        session: Option<String>,

        /// Trial number (cursor chart)
        #[arg(long)]
        trial: Option<u32>,

        /// Store root
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output HTML path
        #[arg(long, default_value = "chart.html")]
        output: PathBuf,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    let result = match cli.command {
        Commands::Scan { dir } => cmd_scan(dir.unwrap_or_else(|| config.raw_root.clone())),
        Commands::Convert { dir, out } => cmd_convert(
            dir.unwrap_or_else(|| config.raw_root.clone()),
            out.unwrap_or_else(|| config.data_root.clone()),
        ),
        Commands::Summary { store, groups } => cmd_summary(
            store.unwrap_or_else(|| config.data_root.clone()),
            groups.or_else(|| config.session_groups_path.clone()),
        ),
        Commands::Latency { store, codes } => cmd_latency(
            store.unwrap_or_else(|| config.data_root.clone()),
            codes.or_else(|| config.trial_codes_path.clone()),
        ),
        Commands::Plot {
            kind,
            session,
            trial,
            store,
            output,
        } => {
            let store = store.unwrap_or_else(|| config.data_root.clone());
            cmd_plot(&config, &kind, session, trial, store, output)
        }
        Commands::Config => cmd_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_scan(dir: PathBuf) -> anyhow::Result<()> {
    let outcome = catalog::scan(&dir).with_context(|| format!("scanning {}", dir.display()))?;

    println!("Sessions in {}:", dir.display());
    for entry in &outcome.sessions {
        println!("  {}  ({})", entry.id.display_start(), entry.id);
    }
    println!();
    println!(
        "{} session(s), {} filename(s) skipped",
        outcome.sessions.len(),
        outcome.skipped.len()
    );
    for skipped in &outcome.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok(())
}

fn cmd_convert(dir: PathBuf, out: PathBuf) -> anyhow::Result<()> {
    println!("vns-sessions v{VERSION}");
    println!("Converting {} -> {}", dir.display(), out.display());
    println!();

    let experiment =
        Experiment::scan(&dir).with_context(|| format!("scanning {}", dir.display()))?;
    let store = SessionStore::new(out);
    let report = experiment.convert_all(&TrialSchema::v1(), &store);

    println!("{}", report.summary());
    Ok(())
}

fn cmd_summary(store_root: PathBuf, groups_path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = SessionStore::new(store_root);
    let groups = match groups_path {
        Some(path) => SessionGroups::from_json_file(&path)
            .with_context(|| format!("loading groups from {}", path.display()))?,
        None => SessionGroups::default(),
    };

    let mut summary = session_summary(&store, &groups)?;
    store.write_session_summary(&mut summary)?;

    println!("{summary}");
    Ok(())
}

fn cmd_latency(store_root: PathBuf, codes_path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = SessionStore::new(store_root);
    let labels = match codes_path {
        Some(path) => TrialTypeLabels::from_json_file(&path)
            .with_context(|| format!("loading code table from {}", path.display()))?,
        None => TrialTypeLabels::default(),
    };

    let mut all_records = Vec::new();
    let mut sessions = Vec::new();
    for id in store.list_sessions()? {
        let trials = store.read_trials(&id)?;
        let records = latency_records(&trials, &labels)?;
        sessions.extend(std::iter::repeat(id.dir_name()).take(records.len()));
        all_records.extend(records);
    }

    if all_records.is_empty() {
        println!("No outcome latencies recorded in this store.");
        return Ok(());
    }

    // Persist the pre-joined artifact consumed by dashboards.
    let latencies: Vec<f64> = all_records.iter().map(|r| r.latency.value()).collect();
    let types: Vec<String> = all_records.iter().map(|r| r.trial_type.clone()).collect();
    let mut table = DataFrame::new(vec![
        Series::new("outcome_latency", latencies),
        Series::new("trial_type", types),
        Series::new("session", sessions),
    ])?;
    store.write_latency_table(&mut table)?;

    let summary = latency_summary(&all_records).expect("records are non-empty");
    println!("Outcome latency over {} trial(s):", summary.count);
    println!("  mean:   {}", summary.mean);
    println!("  median: {}", summary.median);
    println!("  p90:    {}", summary.p90);
    Ok(())
}

#[cfg(feature = "plots")]
fn cmd_plot(
    config: &Config,
    kind: &str,
    session: Option<String>,
    trial: Option<u32>,
    store_root: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    use vns_sessions::present;

    let store = SessionStore::new(store_root);

    let plot = match kind {
        "rolling" => {
            let id = parse_session_arg(session)?;
            let trials = store.read_trials(&id)?;
            let rates = rolling_success_rate(&trials, config.rolling_window)?;
            present::rolling_success_chart(&rates)
        }
        "latency" => {
            let labels = match &config.trial_codes_path {
                Some(path) => TrialTypeLabels::from_json_file(path)?,
                None => TrialTypeLabels::default(),
            };
            let mut records = Vec::new();
            for id in store.list_sessions()? {
                records.extend(latency_records(&store.read_trials(&id)?, &labels)?);
            }
            present::latency_ecdf_chart(&records)
        }
        "cursor" => {
            let id = parse_session_arg(session)?;
            let trial = trial.context("--trial is required for cursor charts")?;
            let samples = store.read_samples_downsampled(&id, trial, config.downsample_step)?;
            let fixation = fixation_for(&store, &id, trial)?;
            present::cursor_path_chart(&samples, fixation)?
        }
        other => anyhow::bail!("unknown chart kind {other:?} (expected rolling, latency or cursor)"),
    };

    present::write_chart(&plot, &output);
    println!("Wrote {}", output.display());
    Ok(())
}

#[cfg(feature = "plots")]
fn parse_session_arg(session: Option<String>) -> anyhow::Result<SessionId> {
    let session = session.context("--session is required for this chart")?;
    SessionId::parse(std::path::Path::new(&session)).map_err(Into::into)
}

/// Fixation window of one trial, read from the stored per-trial table.
#[cfg(feature = "plots")]
fn fixation_for(
    store: &SessionStore,
    id: &SessionId,
    trial: u32,
) -> anyhow::Result<Option<FixationWindow>> {
    let trials = store.read_trials(id)?;
    let index = trial as usize - 1;

    let field = |name: &str| -> anyhow::Result<Seconds> {
        let column = trials.column(name)?.f64()?;
        Ok(Seconds(column.get(index).unwrap_or(0.0)))
    };

    Ok(FixationWindow::from_trial(
        field("timefpon")?,
        field("timefpoff")?,
        field("timefpabort")?,
    ))
}

#[cfg(not(feature = "plots"))]
fn cmd_plot(
    _config: &Config,
    _kind: &str,
    _session: Option<String>,
    _trial: Option<u32>,
    _store_root: PathBuf,
    _output: PathBuf,
) -> anyhow::Result<()> {
    eprintln!("Warning: plot command ignored (plots feature not enabled at compile time)");
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
    Ok(())
}
