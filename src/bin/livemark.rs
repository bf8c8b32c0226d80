//! Livemark CLI: keeps per-dimension marker and player documents in sync.
//!
//! Usage:
//!   livemark watch [--root path] [--config path]
//!   livemark sync
//!   livemark find <query> | get <markerId>
//!   livemark add <dimension> <category> <label> <x> <y> <z>
//!   livemark remove <markerId>
//!   livemark show <dimension> <markers|players|settings>

use clap::{Parser, Subcommand};
use livemark::storage::encode;
use livemark::{
    CycleReport, Dimension, DocumentKind, DocumentOutcome, MarkerId, MarkerRef, Position,
    SyncConfig, SyncEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "livemark",
    version,
    about = "Live marker and player synchronization for multi-dimension web maps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Data root, overriding the config file
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the data root and synchronize on every change
    Watch,
    /// Run a single synchronization cycle
    Sync,
    /// Find markers whose label contains a query (case-insensitive)
    Find {
        query: String,
        /// Only labels equal to the query
        #[arg(long)]
        exact: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a marker by id
    Get {
        id: String,
    },
    /// Add a marker owned by a dimension
    #[command(allow_negative_numbers = true)]
    Add {
        dimension: String,
        category: String,
        label: String,
        x: f64,
        y: f64,
        z: f64,
    },
    /// Remove a marker from the dimension that owns it
    Remove {
        id: String,
    },
    /// Print one of a dimension's documents
    Show {
        dimension: String,
        /// markers, players or settings
        kind: DocumentKind,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<PathBuf>, root: Option<PathBuf>) -> Result<SyncConfig, String> {
    let path = path.unwrap_or_else(SyncConfig::default_path);
    let mut config = SyncConfig::load(&path).map_err(|e| e.to_string())?;
    if let Some(root) = root {
        config.data_root = root;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn print_report(report: &CycleReport) {
    println!(
        "Cycle {}: {} markers in {} categories, {} players online, {} documents written",
        report.cycle, report.markers, report.categories, report.players, report.written
    );
    if report.collisions > 0 {
        println!("Warning: {} marker ids owned by more than one dimension", report.collisions);
    }
    for dim in &report.dimensions {
        for (kind, outcome) in [("markers", &dim.markers), ("players", &dim.players)] {
            match outcome {
                DocumentOutcome::ReadFailed(e) => {
                    eprintln!("Error: could not read {} of '{}': {}", kind, dim.dimension, e)
                }
                DocumentOutcome::WriteFailed(e) => {
                    eprintln!("Error: could not write {} of '{}': {}", kind, dim.dimension, e)
                }
                _ => {}
            }
        }
    }
}

fn print_marker(marker: &MarkerRef) {
    println!(
        "{:<14}  {:<14}  {:<20}  {:>10.1} {:>7.1} {:>10.1}  {}",
        marker.id.as_str(),
        marker.dimension.as_str(),
        marker.category_label,
        marker.position.x,
        marker.position.y,
        marker.position.z,
        marker.label
    );
}

fn cmd_watch(engine: SyncEngine, config: &SyncConfig) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 1;
        }
    };
    let engine = Arc::new(engine);
    let shutdown = CancellationToken::new();
    let result = runtime.block_on(async {
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing current cycle");
            }
            signal.cancel();
        });
        livemark::sync::run(engine, config.data_root.clone(), config.debounce(), shutdown).await
    });
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_sync(engine: &SyncEngine) -> i32 {
    let report = match engine.run_cycle() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    print_report(&report);
    if report.is_clean() {
        0
    } else {
        1
    }
}

fn cmd_find(engine: &SyncEngine, query: &str, exact: bool, json: bool) -> i32 {
    if let Err(e) = engine.load_index() {
        eprintln!("Error: {}", e);
        return 1;
    }
    let hits = if exact {
        engine.index().find_exact(query)
    } else {
        engine.find_by_name(query)
    };
    if json {
        return match serde_json::to_string_pretty(&hits) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }
    if hits.is_empty() {
        println!("No markers match '{}'.", query);
        return 0;
    }
    for hit in &hits {
        print_marker(hit);
    }
    0
}

fn cmd_get(engine: &SyncEngine, id: &str) -> i32 {
    if let Err(e) = engine.load_index() {
        eprintln!("Error: {}", e);
        return 1;
    }
    match engine.marker(&MarkerId::from(id)) {
        Ok(marker) => {
            print_marker(&marker);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_add(engine: &SyncEngine, dimension: &str, category: &str, label: &str, position: Position) -> i32 {
    match engine.add_marker(&Dimension::from(dimension), category, label, position) {
        Ok(id) => {
            println!("Added marker '{}' as {} in '{}'", label, id, dimension);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_remove(engine: &SyncEngine, id: &str) -> i32 {
    match engine.remove_marker(&MarkerId::from(id)) {
        Ok(true) => {
            println!("Removed marker {}", id);
            0
        }
        Ok(false) => {
            eprintln!("Error: marker {} not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_show(engine: &SyncEngine, dimension: &str, kind: DocumentKind) -> i32 {
    let dimension = Dimension::from(dimension);
    let text = match kind {
        DocumentKind::Markers => engine.read_markers(&dimension).map(|d| encode(&d)),
        DocumentKind::Players => engine.read_players(&dimension).map(|d| encode(&d)),
        DocumentKind::Settings => engine.read_settings(&dimension).map(|d| encode(&d)),
    };
    match text {
        Ok(Ok(text)) => {
            print!("{}", text);
            0
        }
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config, cli.root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let engine = match SyncEngine::open(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: failed to open data root: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Watch => cmd_watch(engine, &config),
        Commands::Sync => cmd_sync(&engine),
        Commands::Find { query, exact, json } => cmd_find(&engine, &query, exact, json),
        Commands::Get { id } => cmd_get(&engine, &id),
        Commands::Add { dimension, category, label, x, y, z } => {
            cmd_add(&engine, &dimension, &category, &label, Position::new(x, y, z))
        }
        Commands::Remove { id } => cmd_remove(&engine, &id),
        Commands::Show { dimension, kind } => cmd_show(&engine, &dimension, kind),
    };
    std::process::exit(code);
}
