//! `finhealth`: load provider statements, score company health, and report.
//!
//! # Usage
//!
//! ```text
//! finhealth ingest statements.csv
//! finhealth ingest aapl_income.csv --wide --ticker AAPL --statement income
//! finhealth run --export out/
//! finhealth report --ticker MSFT
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use finhealth_cli::{Settings, commands};
use finhealth_core::{company::PeriodType, report::Layers, vocab::StatementType};
use finhealth_csv::WideLayout;
use finhealth_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Financial statement health scoring")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "finhealth.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load a provider dump into the bronze layer.
  Ingest {
    file: PathBuf,

    /// The file is one statement for one company, one column per period.
    #[arg(long, requires_all = ["ticker", "statement"])]
    wide: bool,

    #[arg(long)]
    ticker: Option<String>,

    #[arg(long, value_parser = parse_statement)]
    statement: Option<StatementType>,

    #[arg(long, value_parser = parse_period_type, default_value = "annual")]
    period_type: PeriodType,
  },

  /// Run the pipeline over the bronze layer and publish every derived layer.
  Run {
    /// Also write the workbook to this directory.
    #[arg(long, value_name = "DIR")]
    export: Option<PathBuf>,
  },

  /// Rebuild the workbook from the published layers.
  Export {
    #[arg(long, value_name = "DIR", default_value = "report")]
    out: PathBuf,
  },

  /// Print the ranking, or one company's detailed report.
  Report {
    #[arg(long)]
    ticker: Option<String>,
  },

  /// List recent pipeline runs.
  Runs {
    #[arg(long, default_value_t = 10)]
    limit: usize,
  },
}

fn parse_statement(s: &str) -> Result<StatementType, String> {
  StatementType::parse(s).map_err(|e| e.to_string())
}

fn parse_period_type(s: &str) -> Result<PeriodType, String> {
  PeriodType::parse(s).map_err(|e| e.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store_path = settings.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Ingest { file, wide, ticker, statement, period_type } => {
      let layout = match (wide, ticker, statement) {
        (true, Some(ticker), Some(statement)) => {
          Some(WideLayout { ticker, statement, period_type })
        }
        _ => None,
      };
      let summary = commands::ingest(&store, &settings, &file, layout.as_ref()).await?;
      println!(
        "ingested {} rows into {} partitions ({} rejected)",
        summary.rows, summary.partitions, summary.rejected
      );
    }

    Command::Run { export } => {
      let (output, record) = commands::run(&store, &settings).await?;
      println!(
        "run {}: {} scored, {} failed",
        record.run_id, output.stats.scored, output.stats.failed
      );
      if let Some(dir) = export {
        let paths = commands::write_export(Layers::from(&output), &settings, &dir)?;
        println!("wrote {} sheets to {}", paths.len(), dir.display());
      }
    }

    Command::Export { out } => {
      let paths = commands::export(&store, &settings, &out).await?;
      for path in paths {
        println!("{}", path.display());
      }
    }

    Command::Report { ticker } => {
      print!("{}", commands::report(&store, &settings, ticker.as_deref()).await?);
    }

    Command::Runs { limit } => {
      print!("{}", commands::runs(&store, &settings, limit).await?);
    }
  }

  Ok(())
}
