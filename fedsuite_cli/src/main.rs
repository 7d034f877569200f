//! fedsuite CLI
//!
//! Build federated-learning test suites from presets, persist them, export
//! the runner payload and optionally follow each test through a run.

use clap::Parser;
use fedsuite_cli::{
    write_suite, CliError, MonitorConfig, PresetOptions, RunMonitor, SuitePreset, SuiteSummary,
};
use fedsuite_core::{DatasetId, Store, SuiteDefaults};
use fedsuite_env::{LocalRunner, RunStatus, SledBlobStore};
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// fedsuite test suite authoring CLI
#[derive(Parser, Debug)]
#[command(name = "fedsuite")]
#[command(about = "Author and export federated-learning test suites", long_about = None)]
struct Args {
    /// Preset to add (baseline, label_skew, linear_skew, stragglers, all)
    #[arg(short, long)]
    preset: Option<String>,

    /// Number of clients for added tests
    #[arg(short, long)]
    clients: Option<NonZeroUsize>,

    /// Number of rounds for added tests
    #[arg(short, long)]
    rounds: Option<NonZeroU32>,

    /// Dataset for added tests (MNIST, CIFAR10, FashionMNIST)
    #[arg(short, long)]
    dataset: Option<DatasetId>,

    /// JSON file overriding the factory defaults
    #[arg(long)]
    defaults: Option<PathBuf>,

    /// Persistent suite database
    #[arg(long)]
    db: Option<PathBuf>,

    /// Start from the suite persisted in --db
    #[arg(long)]
    load: bool,

    /// Write the runner payload of the whole suite to this file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Submit every test to the local runner and follow it
    #[arg(long)]
    run: bool,

    /// Timeline executed by each run
    #[arg(long, default_value = "0")]
    timeline: usize,

    /// Status poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    poll_ms: u64,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_presets(arg: Option<&str>, loaded: bool) -> Result<Vec<SuitePreset>, CliError> {
    match arg {
        Some("all") => Ok(SuitePreset::all()),
        Some(name) => Ok(vec![name.parse()?]),
        None if loaded => Ok(Vec::new()),
        None => Ok(vec![SuitePreset::Baseline]),
    }
}

async fn run(args: Args) -> Result<bool, CliError> {
    let defaults = match &args.defaults {
        Some(path) => SuiteDefaults::from_json_file(path)?,
        None => SuiteDefaults::default(),
    };
    let mut store = Store::with_defaults(defaults);

    let blobs = match &args.db {
        Some(path) => Some(SledBlobStore::open(path)?),
        None => None,
    };

    let mut loaded = false;
    if args.load {
        match &blobs {
            Some(blobs) => {
                loaded = store.load(blobs)?;
                if !loaded {
                    warn!("No suite persisted yet, starting empty");
                }
            }
            None => warn!("--load without --db, starting empty"),
        }
    }

    let options = PresetOptions {
        clients: args.clients,
        rounds: args.rounds,
        dataset: args.dataset,
    };
    for preset in parse_presets(args.preset.as_deref(), loaded)? {
        let name = preset.apply(&mut store, &options)?;
        if !args.json {
            info!("+ {} ({})", name, preset.description());
        }
    }

    if let Some(blobs) = &blobs {
        store.persist(blobs)?;
    }

    if let Some(path) = &args.export {
        write_suite(&store, path)?;
    }

    let mut all_finished = true;
    if args.run {
        let config = MonitorConfig::default().with_poll_interval(Duration::from_millis(args.poll_ms));
        let mut monitor = RunMonitor::new(LocalRunner::new(), config);

        for name in store.test_names() {
            let payload = store.export_test_timeline(name, args.timeline)?;
            let report = monitor.run(&payload).await?;
            if report.status == RunStatus::Finished {
                info!("✓ {} finished after {} polls", report.name, report.polls);
            } else {
                error!("✗ {} ended {}", report.name, report.status);
                all_finished = false;
            }
        }
    }

    let summary = SuiteSummary::from_store(&store)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for test in &summary.tests {
            info!(
                "{}: {} x {} clients, {} rounds, {} timelines ({} events), {} unassigned",
                test.name,
                test.dataset,
                test.n_clients,
                test.rounds,
                test.timelines,
                test.events,
                test.unassigned
            );
        }
        info!("{} tests in suite", summary.total);
    }

    Ok(all_finished)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
