use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use wordbank_core::backfill::{BackfillOptions, run_backfill};
use wordbank_core::config::{DEFAULT_CONFIG_FILE, StorePaths, ToolConfig, load_config};
use wordbank_core::count::render_report;
use wordbank_core::import::{ImportOptions, run_import};
use wordbank_core::model::WordDatabase;

#[derive(Debug, Parser)]
#[command(
    name = "wordbank",
    version,
    about = "Word database tooling for the word-guessing game"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Word database file")]
    data_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Build the word database from a word-list file")]
    Import(ImportArgs),
    #[command(about = "Fetch real definitions for placeholder entries")]
    Backfill(BackfillArgs),
    #[command(about = "Print per-length and total word counts")]
    Count,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(value_name = "WORDLIST", help = "Word list, one token per line")]
    wordlist: PathBuf,
    #[arg(long, value_name = "PATH", help = "Tab-separated lexicon supplying definitions")]
    lexicon: Option<PathBuf>,
    #[arg(long, value_name = "N", help = "Longest word length to keep")]
    max_length: Option<usize>,
}

#[derive(Debug, Args)]
struct BackfillArgs {
    #[arg(long, help = "Continue a prior run using the saved checkpoint")]
    resume: bool,
    #[arg(long, help = "Only process the first 50 placeholder words")]
    test_mode: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;
    let paths = config.store_paths(cli.data_file.as_deref());
    init_logging(&paths.log_file)?;

    match cli.command {
        Commands::Import(args) => run_import_command(&paths, args),
        Commands::Backfill(args) => run_backfill_command(&config, &paths, args),
        Commands::Count => run_count_command(&paths),
    }
}

fn run_import_command(paths: &StorePaths, args: ImportArgs) -> Result<()> {
    let mut options = ImportOptions::default();
    if let Some(max_length) = args.max_length {
        options.max_length = max_length;
    }
    let (database, report) = run_import(
        &args.wordlist,
        args.lexicon.as_deref(),
        &options,
        &paths.data_file,
    )?;

    println!("{}", render_report(&database));
    println!();
    println!("source tokens: {}", report.source_tokens);
    println!("unique tokens: {}", report.unique_tokens);
    println!("imported: {}", report.imported);
    println!("skipped: {}", report.skipped);
    println!("with definitions: {}", report.defined);
    Ok(())
}

fn run_backfill_command(config: &ToolConfig, paths: &StorePaths, args: BackfillArgs) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let report = run_backfill(
        paths,
        &config.api_settings(),
        &BackfillOptions {
            resume: args.resume,
            test_mode: args.test_mode,
        },
        &cancel,
    )?;

    println!(
        "backfill {}",
        if report.cancelled { "interrupted" } else { "complete" }
    );
    if let Some(backup_path) = &report.backup_path {
        println!("backup: {}", backup_path.display());
    }
    println!("processed: {}", report.processed);
    println!("updated: {}", report.updated);
    println!("api failures: {}", report.api_failures);
    println!("network errors: {}", report.network_errors);
    Ok(())
}

fn run_count_command(paths: &StorePaths) -> Result<()> {
    let database = WordDatabase::load(&paths.data_file)?;
    println!("{}", render_report(&database));
    Ok(())
}

/// Duplicates every log line to stdout and the log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.flush()
    }
}

fn init_logging(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    builder
        .try_init()
        .context("failed to initialize logging")?;
    Ok(())
}
