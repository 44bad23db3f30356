//! Octagon CLI - load fight data extracts and query the result
//!
//! # Main Commands
//!
//! ```bash
//! octagon import --clear            # Load data/{fighters,events,fightstats}.csv
//! octagon import --only fightstats  # Rerun a single stage
//! octagon fights UFC300             # Reconstructed fights of an event (JSON)
//! octagon serve                     # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! octagon parse fighters data/fighters.csv   # Typed records, nothing stored
//! octagon counts                             # Documents per collection
//! ```
//!
//! Exit codes: 0 on success (row errors included), 1 when the store or the
//! command setup fails, 2 when an extract could not be used.

use clap::{Args, Parser, Subcommand};
use octagon::store::JsonFileStore;
use octagon::transform::loader::check_key_columns;
use octagon::transform::pipeline::{EXIT_FATAL, EXIT_OK};
use octagon::{
    event_status_counts, read_extract, reconstruct, store_counts, Config, EventRecord, ExtractSources,
    FightStatRecord, FighterRecord, ImportContext, ImportPlan, ImportStage, Importer, MemoryStore, ParsedExtract,
    RecordKind, RecordStore, RunSummary, StageOutcome,
};
use octagon::api::{types::FightsResponse, AppState};
use octagon::transform::FromExtract;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "octagon")]
#[command(about = "Load MMA fighter, event and fight statistics extracts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import extracts into the store
    Import(ImportArgs),

    /// Print the reconstructed fights of an event as JSON
    Fights {
        /// Event id (fight ids start with "<EVENT_ID>_")
        event_id: String,

        /// Store directory (default: OCTAGON_STORE_DIR or .octagon/store)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Parse and normalize an extract, print typed records as JSON
    Parse {
        /// Record kind: fighters, events or fightstats
        #[arg(value_parser = parse_kind)]
        kind: RecordKind,

        /// Input CSV file
        input: PathBuf,

        /// Print header→value records instead of typed ones
        #[arg(long)]
        raw: bool,
    },

    /// Show document counts per collection
    Counts {
        /// Store directory (default: OCTAGON_STORE_DIR or .octagon/store)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: OCTAGON_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Store directory (default: OCTAGON_STORE_DIR or .octagon/store)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ImportArgs {
    /// Directory with fighters.csv, events.csv and fightstats.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Fighters extract (overrides the data directory)
    #[arg(long)]
    fighters: Option<PathBuf>,

    /// Events extract (overrides the data directory)
    #[arg(long)]
    events: Option<PathBuf>,

    /// Fight statistics extract (overrides the data directory)
    #[arg(long)]
    fightstats: Option<PathBuf>,

    /// Remove the documents of the imported kinds before importing
    #[arg(long)]
    clear: bool,

    /// Only run these stages (comma separated: clear,fighters,events,fightstats)
    #[arg(long, value_delimiter = ',', value_parser = parse_stage)]
    only: Vec<ImportStage>,

    /// Store directory (default: OCTAGON_STORE_DIR or .octagon/store)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Import into memory only; nothing is written
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn parse_kind(s: &str) -> Result<RecordKind, String> {
    RecordKind::from_name(s).ok_or_else(|| format!("unknown record kind '{}'", s))
}

fn parse_stage(s: &str) -> Result<ImportStage, String> {
    ImportStage::from_name(s).ok_or_else(|| format!("unknown stage '{}'", s))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> CliResult<i32> {
    let config = Config::from_env()?;

    match cli.command {
        Commands::Import(args) => cmd_import(&config, args),

        Commands::Fights { event_id, store } => {
            cmd_fights(&with_store(&config, store), &event_id).map(|_| EXIT_OK)
        }

        Commands::Parse { kind, input, raw } => cmd_parse(kind, &input, raw).map(|_| EXIT_OK),

        Commands::Counts { store } => cmd_counts(&with_store(&config, store)).map(|_| EXIT_OK),

        Commands::Serve { port, store } => {
            let mut config = with_store(&config, store);
            if let Some(port) = port {
                config = config.with_port(port);
            }
            cmd_serve(&config).await.map(|_| EXIT_OK)
        }
    }
}

fn with_store(config: &Config, store: Option<PathBuf>) -> Config {
    match store {
        Some(dir) => config.clone().with_store_dir(dir),
        None => config.clone(),
    }
}

fn open_store(config: &Config) -> CliResult<JsonFileStore> {
    let store = JsonFileStore::open(&config.store_dir)?;
    eprintln!("📂 Store: {}", store.root().display());
    Ok(store)
}

fn cmd_import(config: &Config, args: ImportArgs) -> CliResult<i32> {
    let mut config = with_store(config, args.store);
    if let Some(dir) = args.data_dir {
        config = config.with_data_dir(dir);
    }

    let mut sources = ExtractSources::in_dir(&config.data_dir);
    if let Some(path) = args.fighters {
        sources.fighters = path;
    }
    if let Some(path) = args.events {
        sources.events = path;
    }
    if let Some(path) = args.fightstats {
        sources.fightstats = path;
    }

    let mut plan = if args.only.is_empty() {
        ImportPlan::full()
    } else {
        ImportPlan::only(args.only)
    };
    if args.clear {
        plan = plan.with_clear();
    }

    let summary = if args.dry_run {
        eprintln!("🧪 Dry run: importing into memory");
        let store = MemoryStore::new();
        Importer::new(&store, config.loader_options()).run(&plan, &sources)?
    } else {
        let store = open_store(&config)?;
        Importer::new(&store, config.loader_options()).run(&plan, &sources)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_run_summary(&summary);
    }

    Ok(summary.exit_code())
}

fn print_run_summary(summary: &RunSummary) {
    println!("\n📊 Run {}", summary.run_id);
    for report in &summary.stages {
        match &report.outcome {
            StageOutcome::Loaded { summary: load, .. } => println!(
                "   {:<11} {} imported, {} errors ({} malformed) in {} ms",
                report.stage, load.imported_count, load.error_count, load.malformed_rows, report.elapsed_ms
            ),
            StageOutcome::Cleared { removed } => println!(
                "   {:<11} {} documents removed",
                report.stage,
                removed.values().sum::<usize>()
            ),
            StageOutcome::Failed { message, .. } => println!("   {:<11} ❌ {}", report.stage, message),
        }
    }
    println!("\n   Database summary:");
    for (kind, count) in &summary.counts {
        println!("     {:<11} {}", kind, count);
    }
}

fn cmd_fights(config: &Config, event_id: &str) -> CliResult<()> {
    let store = open_store(config)?;
    let fights = reconstruct(&store, event_id)?;
    eprintln!("🥊 {} fights for {}", fights.len(), event_id);

    let response = FightsResponse::new(event_id, fights);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_parse(kind: RecordKind, input: &Path, raw: bool) -> CliResult<()> {
    eprintln!("📄 Parsing {} extract: {}", kind, input.display());

    let extract = read_extract(input)?;
    eprintln!("   Encoding: {}", extract.encoding);
    eprintln!("   Columns: {}", extract.headers.join(", "));
    if !extract.malformed.is_empty() {
        eprintln!("   ⚠️  {} malformed rows dropped", extract.malformed.len());
        for row in extract.malformed.iter().take(5) {
            eprintln!("      Line {}: expected {} fields, found {}", row.line, row.expected, row.found);
        }
    }

    let records = if raw {
        extract.records.iter().map(|r| r.to_json()).collect()
    } else {
        check_key_columns(kind, &extract)?;
        let ctx = ImportContext::at_now();
        match kind {
            RecordKind::Fighters => typed_records::<FighterRecord>(&extract, &ctx)?,
            RecordKind::Events => typed_records::<EventRecord>(&extract, &ctx)?,
            RecordKind::FightStats => typed_records::<FightStatRecord>(&extract, &ctx)?,
        }
    };
    eprintln!("✅ Parsed {} records", records.len());

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn typed_records<T: FromExtract>(extract: &ParsedExtract, ctx: &ImportContext) -> serde_json::Result<Vec<Value>> {
    extract
        .records
        .iter()
        .map(|raw| serde_json::to_value(T::from_raw(raw, ctx)))
        .collect()
}

fn cmd_counts(config: &Config) -> CliResult<()> {
    let store = open_store(config)?;
    let counts = store_counts(&store)?;
    let events = event_status_counts(&store)?;

    for kind in RecordKind::ALL {
        println!("{:<11} {}", kind, counts.get(&kind).copied().unwrap_or(0));
    }
    println!("  upcoming  {}", events.upcoming);
    println!("  completed {}", events.completed);
    Ok(())
}

async fn cmd_serve(config: &Config) -> CliResult<()> {
    let store: Arc<dyn RecordStore> = Arc::new(open_store(config)?);
    let state = AppState::new(store, config.loader_options());
    octagon::server::start_server(config.port, state).await
}
