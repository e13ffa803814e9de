use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use alttpr_core::Caches;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "alttpr", version, about = "ALTTP randomizer config and ROM cache tool")]
struct Args {
    /// Cache base directory
    #[arg(long, global = true, env = "ALTTPR_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Schema {
    /// Complete nested settings sent to the seed generator
    SeedGen,
    /// Flat preset settings
    Preset,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the default configuration
    Defaults {
        #[arg(long, value_enum, default_value_t = Schema::SeedGen)]
        schema: Schema,
    },

    /// Convert a JSON settings file between schemas
    Convert {
        #[arg(long, value_enum)]
        from: Schema,
        #[arg(long, value_enum)]
        to: Schema,
        file: PathBuf,
    },

    /// Store a settings document from the service as the cached copy
    ImportSettings { file: PathBuf },

    /// List presets from the cached settings
    Presets,

    /// Save a snapshot built from a cached preset or a preset file
    Save {
        slot: String,
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        preset: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print a saved snapshot
    Load {
        slot: String,
        #[arg(long, value_enum, default_value_t = Schema::Preset)]
        schema: Schema,
    },

    /// Change one option in a saved snapshot
    Set { slot: String, key: String, value: String },

    /// List snapshot slots that hold a saved configuration
    Slots,

    /// Register the unmodified base ROM
    BaseRom { path: PathBuf },

    /// Print the resolved cache directory
    CacheDir,
}

fn resolve_cache_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(Caches::default_dir)
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let caches = Caches::open(resolve_cache_dir(args.cache_dir));
    tracing::debug!(root = %caches.root().display(), "opened cache");

    if let Err(err) = commands::run(args.command, &caches) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
