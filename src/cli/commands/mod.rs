//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod assets;
mod check;
mod db;
mod discover;
mod image_to_text;
mod replace;
mod report;
mod scrub;
mod transcribe;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use recordscribe::config::{load_settings, LoadOptions};
use recordscribe::models::{Granularity, Window};

#[derive(Parser)]
#[command(name = "rscribe")]
#[command(about = "Resumable OCR transcription for scanned medical records")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides ./recordscribe.{toml,yaml,yml,json})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Ledger database URL or path (overrides config file and DATABASE_URL)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Window selection shared by the batch commands.
#[derive(Args, Debug, Clone, Copy)]
struct WindowArgs {
    /// Number of items to process in this run
    #[arg(long, alias = "chunk_size", default_value_t = 1000)]
    chunk_size: u64,

    /// Index of the first item to process
    #[arg(long, default_value_t = 0)]
    offset: u64,
}

impl From<WindowArgs> for Window {
    fn from(args: WindowArgs) -> Self {
        Window::new(args.offset, args.chunk_size)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the ledger schema
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Scan a records tree and print a JSON file map
    Scan {
        /// Root directory to scan
        path: PathBuf,
        /// Write the file map here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scan a records tree and register its files in the ledger
    Register {
        /// Root directory to scan
        path: PathBuf,
        /// Granularity the registered files will be transcribed at
        #[arg(long, value_enum, default_value = "document")]
        document_type: Granularity,
    },

    /// List registered assets and their transcription state
    Assets {
        #[arg(long, value_enum, default_value = "document")]
        document_type: Granularity,
    },

    /// Remove an asset with its outputs and metadata from the ledger
    Forget {
        /// Asset ID as shown by `assets`
        id: i32,
    },

    /// Transcribe pending ledger assets
    Transcribe {
        /// Output root for text files
        output_to: PathBuf,
        /// Only assets registered with this granularity
        #[arg(long, value_enum, default_value = "document")]
        document_type: Granularity,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Transcribe the files listed in a JSON file map
    ImageToText {
        /// JSON file map of unit records
        input_file: PathBuf,
        /// Output root for text files and results
        output_to: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
        /// Unit of text to emit
        #[arg(long, value_enum, default_value = "page")]
        strategy: Granularity,
        /// Scrub PII from every written unit
        #[arg(long)]
        scrub: bool,
        /// Minimum entity score to redact (defaults to the configured threshold)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Scrub PII from transcribed ledger outputs
    Scrub {
        /// Output root for scrubbed text and reports
        output_to: PathBuf,
        #[arg(long, value_enum, default_value = "document")]
        document_type: Granularity,
        #[command(flatten)]
        window: WindowArgs,
        /// Minimum entity score to redact (defaults to the configured threshold)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Replace strings listed in a CSV/TSV column in transcribed outputs
    ReplaceStrings {
        /// CSV (.csv) or TSV file holding the strings
        data_file: PathBuf,
        /// Column holding the strings
        key_column: String,
        /// Replacement token
        replacement: String,
        /// Output root for replaced text
        output_dir: PathBuf,
        #[arg(long, value_enum, default_value = "document")]
        document_type: Granularity,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Show a confidence histogram of file map results
    Report {
        /// Directory holding filemap_confidence-*.json files
        dir: PathBuf,
    },

    /// Check if required OCR tools are installed
    OcrCheck,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the ledger tables
    Install,
    /// Drop the ledger tables
    Drop,
}

/// Run the CLI.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        database: cli.database,
    };
    let settings = load_settings(&options)?;

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Install => db::cmd_install(&settings),
            DbCommands::Drop => db::cmd_drop(&settings),
        },
        Commands::Scan { path, output } => discover::cmd_scan(&settings, &path, output.as_deref()),
        Commands::Register {
            path,
            document_type,
        } => discover::cmd_register(&settings, &path, document_type),
        Commands::Assets { document_type } => assets::cmd_assets(&settings, document_type),
        Commands::Forget { id } => assets::cmd_forget(&settings, id),
        Commands::Transcribe {
            output_to,
            document_type,
            window,
        } => transcribe::cmd_transcribe(&settings, &output_to, document_type, window.into()),
        Commands::ImageToText {
            input_file,
            output_to,
            window,
            strategy,
            scrub,
            threshold,
        } => image_to_text::cmd_image_to_text(
            &settings,
            &input_file,
            &output_to,
            window.into(),
            strategy,
            scrub.then(|| threshold.unwrap_or(settings.scrub.threshold)),
        ),
        Commands::Scrub {
            output_to,
            document_type,
            window,
            threshold,
        } => scrub::cmd_scrub(
            &settings,
            &output_to,
            document_type,
            window.into(),
            threshold.unwrap_or(settings.scrub.threshold),
        ),
        Commands::ReplaceStrings {
            data_file,
            key_column,
            replacement,
            output_dir,
            document_type,
            window,
        } => replace::cmd_replace_strings(
            &settings,
            &data_file,
            &key_column,
            &replacement,
            &output_dir,
            document_type,
            window.into(),
        ),
        Commands::Report { dir } => report::cmd_report(&dir),
        Commands::OcrCheck => check::cmd_ocr_check(&settings),
    }
}
