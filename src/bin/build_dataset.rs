use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, warn};

use match_features::config::{
    DEFAULT_FILE_PREFIX, DEFAULT_GAME_MODE, DEFAULT_WINDOW, PipelineConfig,
    default_history_db_path,
};
use match_features::{ColumnCatalog, HistoryStore, StatFields, export, history_db, pipeline};

#[derive(Debug, Parser)]
#[command(
    name = "build_dataset",
    about = "Flatten fetched match backups into a typed training table"
)]
struct Args {
    /// Directory holding backup_1.json, backup_2.json, ...
    #[arg(long, env = "MATCH_INPUT_DIR", default_value = ".")]
    input_dir: PathBuf,

    #[arg(long, env = "MATCH_BACKUP_PREFIX", default_value = DEFAULT_FILE_PREFIX)]
    prefix: String,

    #[arg(long, env = "MATCH_OUTPUT", default_value = "matches.parquet")]
    out: PathBuf,

    /// Keep only this game mode; 0 keeps every mode.
    #[arg(long, env = "MATCH_GAME_MODE", default_value_t = DEFAULT_GAME_MODE)]
    game_mode: i64,

    /// Number of prior matches averaged into pre-game features.
    #[arg(long, env = "HISTORY_WINDOW", default_value_t = DEFAULT_WINDOW)]
    window: usize,

    #[arg(long, env = "HISTORY_DB")]
    history_db: Option<PathBuf>,

    /// Keep player history in memory only.
    #[arg(long)]
    no_history_db: bool,

    /// Also write the pre-game (point-in-time) feature table here.
    #[arg(long, env = "PREGAME_OUTPUT")]
    pregame_out: Option<PathBuf>,

    /// Stop at the first rejected batch instead of skipping it.
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.window == 0 {
        return Err(anyhow!("--window must be at least 1"));
    }

    let config = PipelineConfig {
        input_dir: args.input_dir.clone(),
        file_prefix: args.prefix.clone(),
        game_mode: (args.game_mode != 0).then_some(args.game_mode),
        window_size: args.window,
        fail_fast: args.fail_fast,
        build_pregame: args.pregame_out.is_some(),
    };

    let catalog = ColumnCatalog::standard().context("build column catalog")?;
    let fields = StatFields::default();

    let db_path = if args.no_history_db {
        None
    } else {
        Some(
            args.history_db
                .clone()
                .or_else(default_history_db_path)
                .context("unable to resolve history db path")?,
        )
    };
    let mut conn = match &db_path {
        Some(path) => Some(history_db::open_db(path)?),
        None => None,
    };
    let store = match &conn {
        Some(conn) => history_db::load_store(conn)?,
        None => HistoryStore::new(),
    };
    info!("loaded history: {} snapshots", store.len());

    let output = pipeline::run(&config, &catalog, &store, &fields)?;
    let summary = &output.summary;

    let written = export::write_parquet(&output.table, &args.out)?;
    if let (Some(table), Some(path)) = (&output.pregame, &args.pregame_out) {
        export::write_parquet(table, path)?;
        info!("pre-game table written to {}", path.display());
    }

    let saved = match (&mut conn, &db_path) {
        (Some(conn), Some(path)) => {
            let n = history_db::save_store(conn, &store)?;
            info!("history db: {}", path.display());
            n
        }
        _ => 0,
    };

    println!("Dataset build complete");
    println!("Output: {} ({} rows)", args.out.display(), written);
    println!(
        "Files: {}  matches seen: {}",
        summary.files_read, summary.matches_seen
    );
    println!(
        "Skipped: invalid={} game_mode={} duplicate={} unusable={}",
        summary.invalid_skipped,
        summary.mode_skipped,
        summary.duplicate_skipped,
        summary.flatten_failed
    );
    println!("Batches rejected: {}", summary.batches_rejected);
    println!(
        "History: appended={} duplicates={} skipped={} saved={}",
        summary.history_appended, summary.history_duplicates, summary.history_skipped, saved
    );
    if output.pregame.is_some() {
        println!("Pre-game rows skipped: {}", summary.pregame_skipped);
    }
    if !summary.errors.is_empty() {
        warn!("{} errors during ingest", summary.errors.len());
        println!("Errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    Ok(())
}
