#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cukeprobe::CukeprobeError;
use cukeprobe::config::{self, CacheSettings, LogLevel};
use cukeprobe::logging::{self, LogOptions};
use cukeprobe::types::OutputFormat;
use cukeprobe::webdriver_manager::GLOBAL_DRIVER_MANAGER;

mod commands;

use crate::commands::cache::CacheCommands;
use crate::commands::resolve::ResolveArgs;
use crate::commands::run::RunArgs;

const EXIT_SUCCESS: i32 = 0;
const EXIT_INVALID_INPUT: i32 = 3;

#[derive(Parser)]
#[command(name = "cukeprobe")]
#[command(
    about = "Run Cucumber features in a browser, resolving elements with a cache, heuristics and an LLM",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info", ignore_case = true)]
    log_level: LogLevel,

    /// Directory for the rolling debug log
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Don't write a log file
    #[arg(long, global = true)]
    no_log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a feature file in a browser
    Run(RunArgs),

    /// Show scenarios, steps and elements extracted from a feature file
    Parse {
        /// Feature file to parse
        feature: PathBuf,

        /// Only show scenarios with one of these tags (comma separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,
    },

    /// Open a page and resolve one element description
    Resolve(ResolveArgs),

    /// Inspect or clear the selector cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,

        #[command(flatten)]
        cache: CacheSettings,

        /// Output format
        #[arg(short, long, default_value = "simple", global = true)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    config::load_dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors exit as invalid input; --help and --version exit normally
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(EXIT_INVALID_INPUT);
        }
        Err(e) => e.exit(),
    };

    let log_options = LogOptions {
        level: cli.log_level,
        log_dir: (!cli.no_log_file).then(|| cli.log_dir.clone()),
    };
    let guard = match logging::init(&log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    let result = run(cli).await;

    // Always clean up WebDriver processes before exiting
    GLOBAL_DRIVER_MANAGER.stop_all();
    // process::exit skips destructors; flush the log file first
    drop(guard);

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let err: CukeprobeError = err.into();

            // JSON error on stdout for programmatic consumption
            if let Some(error_json) = commands::error_json(&err) {
                println!(
                    "{}",
                    serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
                );
            }

            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => commands::run::handle_run(args).await,
        Commands::Parse {
            feature,
            tags,
            format,
        } => commands::parse::handle_parse(&feature, &tags, format),
        Commands::Resolve(args) => commands::resolve::handle_resolve(args).await,
        Commands::Cache {
            command,
            cache,
            format,
        } => commands::cache::handle_cache(command, &cache, format),
    }
}
