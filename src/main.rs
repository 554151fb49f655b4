use clap::{Parser, Subcommand};
use sheet_splitter::api::ApiConfig;
use sheet_splitter::cli;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sheet-splitter")]
#[command(about = "Split an Excel workbook into one standalone workbook per sheet.")]
#[command(long_about = "Sheet Splitter - one workbook in, one workbook per sheet out

Each extracted sheet keeps its values, formulas, cell styles, column widths,
row heights and merged ranges. Charts, images, defined names and conditional
formatting are not copied.

COMMANDS:
  sheets  - List the sheets of a workbook
  split   - Extract sheets into standalone .xlsx files
  serve   - Run the HTTP upload/split service

EXAMPLES:
  sheet-splitter sheets book.xlsx
  sheet-splitter split book.xlsx -s Sales -s Expenses -o out/
  sheet-splitter split book.xlsx -s Sales -s Expenses --zip
  sheet-splitter serve --host 0.0.0.0 --port 8080")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook in order
    Sheets {
        /// Workbook (.xlsx or .xls)
        file: PathBuf,
    },

    /// Extract sheets into standalone workbooks
    Split {
        /// Workbook (.xlsx or .xls)
        file: PathBuf,

        /// Sheet to extract (repeatable, exact and case-sensitive)
        #[arg(short, long = "sheet", required = true)]
        sheets: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Bundle the outputs into one ZIP archive
        #[arg(long)]
        zip: bool,

        /// Show per-sheet progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the HTTP service
    Serve {
        /// Host address to bind to (use 0.0.0.0 for all interfaces)
        #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SPLITTER_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "SPLITTER_PORT")]
        port: u16,

        /// Directory for upload staging (defaults to the system temp dir)
        #[arg(long, env = "SPLITTER_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,

        /// Maximum upload size in MiB
        #[arg(long, default_value = "30", env = "SPLITTER_MAX_UPLOAD_MB")]
        max_upload_mb: usize,

        /// Seconds an upload session stays available
        #[arg(long, default_value = "3600", env = "SPLITTER_SESSION_TTL_SECS")]
        session_ttl_secs: u64,

        /// Run a background sweep every N seconds (off by default)
        #[arg(long, env = "SPLITTER_SWEEP_INTERVAL_SECS")]
        sweep_interval_secs: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sheets { file } => cli::sheets(file)?,

        Commands::Split {
            file,
            sheets,
            output,
            zip,
            verbose,
        } => {
            cli::split(file, sheets, output, zip, verbose)?;
        }

        Commands::Serve {
            host,
            port,
            upload_dir,
            max_upload_mb,
            session_ttl_secs,
            sweep_interval_secs,
        } => {
            let defaults = ApiConfig::default();
            let config = ApiConfig {
                host,
                port,
                upload_dir: upload_dir.unwrap_or(defaults.upload_dir),
                max_upload_bytes: max_upload_mb * 1024 * 1024,
                session_max_age: Duration::from_secs(session_ttl_secs),
                sweep_interval: sweep_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
                ..defaults
            };
            cli::serve(config)?;
        }
    }

    Ok(())
}
