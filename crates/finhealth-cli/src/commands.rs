//! Subcommand bodies. Each one works against any [`LayerStore`] and wraps
//! every store call in [`with_retry`].

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use chrono::Utc;
use finhealth_core::{
  pipeline::{self, RunOutput},
  report::{self, Layers},
  statement::RawStatementRow,
  store::{LayerStore, RunRecord},
  vocab::StatementType,
};
use finhealth_csv::WideLayout;
use tracing::{info, warn};

use crate::{render, retry::with_retry, settings::Settings};

// ─── Ingest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
  pub rows:       usize,
  pub partitions: usize,
  pub rejected:   usize,
}

/// Load a provider dump from `path`. See [`ingest_text`].
pub async fn ingest<S: LayerStore>(
  store: &S,
  settings: &Settings,
  path: &Path,
  wide: Option<&WideLayout>,
) -> anyhow::Result<IngestSummary> {
  let input = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  ingest_text(store, settings, &input, wide).await
}

/// Parse `input` and replace every (company, statement) partition it touches.
///
/// Malformed records are logged and counted; they never abort the load.
pub async fn ingest_text<S: LayerStore>(
  store: &S,
  settings: &Settings,
  input: &str,
  wide: Option<&WideLayout>,
) -> anyhow::Result<IngestSummary> {
  let parsed = match wide {
    Some(layout) => finhealth_csv::parse_wide(input, layout),
    None => finhealth_csv::parse_long(input),
  };

  let mut rejected = 0;
  let mut partitions: BTreeMap<(String, StatementType), Vec<RawStatementRow>> =
    BTreeMap::new();
  for result in parsed {
    match result {
      Ok(row) => partitions
        .entry((row.ticker().to_owned(), row.statement))
        .or_default()
        .push(row),
      Err(e) => {
        warn!(error = %e, "skipping malformed record");
        rejected += 1;
      }
    }
  }

  let mut rows = 0;
  for ((ticker, statement), partition) in &partitions {
    rows += with_retry(&settings.retry, "replace bronze partition", || {
      store.replace_raw_partition(ticker.clone(), *statement, partition.clone())
    })
    .await?;
  }

  info!(rows, partitions = partitions.len(), rejected, "ingested provider dump");
  Ok(IngestSummary { rows, partitions: partitions.len(), rejected })
}

// ─── Run ─────────────────────────────────────────────────────────────────────

/// Run the pipeline over the whole bronze layer and publish the result.
pub async fn run<S: LayerStore>(
  store: &S,
  settings: &Settings,
) -> anyhow::Result<(RunOutput, RunRecord)> {
  let started_at = Utc::now();
  let rows = with_retry(&settings.retry, "load bronze rows", || store.load_raw_rows()).await?;

  let field_map = settings.field_map().context("invalid field aliases")?;
  let scoring = settings.scoring.clone();
  let universe = settings.universe.clone();
  let output = tokio::task::spawn_blocking(move || {
    pipeline::run(&scoring, &field_map, &universe, &rows)
  })
  .await
  .context("pipeline worker panicked")?
  .context("pipeline refused to run")?;

  let record = RunRecord::new(started_at, &output);
  with_retry(&settings.retry, "publish run", || {
    store.publish_run(output.clone(), record.clone())
  })
  .await?;

  info!(
    run_id = %record.run_id,
    scored = output.stats.scored,
    failed = output.stats.failed,
    "run published"
  );
  Ok((output, record))
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// Write the workbook for `layers` into `dir`, one CSV per sheet.
pub fn write_export(
  layers: Layers<'_>,
  settings: &Settings,
  dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
  let workbook = report::assemble(layers, settings.scoring.healthy_threshold);
  finhealth_csv::write_workbook(&workbook, dir)
    .with_context(|| format!("failed to export workbook to {}", dir.display()))
}

/// Rebuild the workbook from the persisted layers.
pub async fn export<S: LayerStore>(
  store: &S,
  settings: &Settings,
  dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
  let policy = &settings.retry;
  let companies = with_retry(policy, "load companies", || store.list_companies()).await?;
  let facts = with_retry(policy, "load facts", || store.load_facts()).await?;
  let kpis = with_retry(policy, "load kpis", || store.load_kpis()).await?;
  let scores = with_retry(policy, "load scores", || store.load_scores()).await?;
  let failures = with_retry(policy, "load failures", || store.load_failures()).await?;

  let layers = Layers {
    companies: &companies,
    facts:     &facts,
    kpis:      &kpis,
    scores:    &scores,
    failures:  &failures,
  };
  write_export(layers, settings, dir)
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// The ranking summary, or the detailed report for `ticker`.
pub async fn report<S: LayerStore>(
  store: &S,
  settings: &Settings,
  ticker: Option<&str>,
) -> anyhow::Result<String> {
  let policy = &settings.retry;
  let scores = with_retry(policy, "load scores", || store.load_scores()).await?;
  let failures = with_retry(policy, "load failures", || store.load_failures()).await?;
  let companies = with_retry(policy, "load companies", || store.list_companies()).await?;

  if scores.is_empty() && failures.is_empty() {
    bail!("no scores yet; run `finhealth run` first");
  }

  let Some(ticker) = ticker else {
    return Ok(render::ranking(
      &scores,
      &failures,
      &companies,
      settings.scoring.healthy_threshold,
    ));
  };

  if let Some(score) = scores.iter().find(|s| s.ticker().eq_ignore_ascii_case(ticker)) {
    return Ok(render::detail(score, &companies));
  }
  match failures.iter().find(|f| f.ticker.eq_ignore_ascii_case(ticker)) {
    Some(failure) => bail!("{} was not scored: {}", failure.ticker, failure.reason),
    None => bail!("{ticker} is not in the scored universe"),
  }
}

// ─── Runs ────────────────────────────────────────────────────────────────────

pub async fn runs<S: LayerStore>(
  store: &S,
  settings: &Settings,
  limit: usize,
) -> anyhow::Result<String> {
  let records = with_retry(&settings.retry, "list runs", || store.list_runs(limit)).await?;
  Ok(render::runs(&records))
}

#[cfg(test)]
mod tests {
  use finhealth_core::company::{Company, PeriodType};
  use finhealth_store_sqlite::SqliteStore;

  use super::*;

  const AAPL: &str = "\
ticker,period_end,period_type,statement,field,value
AAPL,2024-09-28,annual,balance,Current Assets,200
AAPL,2024-09-28,annual,balance,Current Liabilities,100
AAPL,2024-09-28,annual,balance,Total Liabilities,300
AAPL,2024-09-28,annual,balance,Total Equity,150
AAPL,2024-09-28,annual,income,Total Revenue,500
AAPL,2024-09-28,annual,income,Net Income,50
AAPL,not-a-date,annual,income,Net Income,50
";

  fn settings() -> Settings {
    Settings {
      universe: vec![
        Company::new("AAPL", "Apple Inc."),
        Company::new("MSFT", "Microsoft Corporation"),
      ],
      ..Settings::default()
    }
  }

  async fn store() -> SqliteStore { SqliteStore::open_in_memory().await.unwrap() }

  #[tokio::test]
  async fn ingest_groups_rows_into_partitions() {
    let s = store().await;
    let summary = ingest_text(&s, &settings(), AAPL, None).await.unwrap();
    assert_eq!(summary, IngestSummary { rows: 6, partitions: 2, rejected: 1 });

    // Loading the same dump again replaces rather than appends.
    ingest_text(&s, &settings(), AAPL, None).await.unwrap();
    assert_eq!(s.load_raw_rows().await.unwrap().len(), 6);
  }

  #[tokio::test]
  async fn wide_dump_lands_in_one_partition() {
    let s = store().await;
    let layout = WideLayout {
      ticker:      "msft".into(),
      statement:   StatementType::Income,
      period_type: PeriodType::Annual,
    };
    let input = "metric,2024-06-30,2023-06-30\nTotal Revenue,245122000000,211915000000\n";
    let summary = ingest_text(&s, &settings(), input, Some(&layout)).await.unwrap();
    assert_eq!(summary, IngestSummary { rows: 2, partitions: 1, rejected: 0 });
  }

  #[tokio::test]
  async fn run_publishes_every_layer_and_records_the_run() {
    let s = store().await;
    ingest_text(&s, &settings(), AAPL, None).await.unwrap();

    let (output, record) = run(&s, &settings()).await.unwrap();
    assert_eq!(output.scores.len(), 1);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].ticker, "MSFT");
    assert_eq!(s.load_scores().await.unwrap(), output.scores);

    let runs = s.list_runs(5).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, record.run_id);
  }

  #[tokio::test]
  async fn reports_read_the_published_snapshot() {
    let s = store().await;
    assert!(report(&s, &settings(), None).await.is_err());

    ingest_text(&s, &settings(), AAPL, None).await.unwrap();
    run(&s, &settings()).await.unwrap();

    let summary = report(&s, &settings(), None).await.unwrap();
    assert!(summary.contains("Apple Inc."));
    assert!(summary.contains("healthy: "));

    let detail = report(&s, &settings(), Some("aapl")).await.unwrap();
    assert!(detail.starts_with("AAPL  Apple Inc."));

    let err = report(&s, &settings(), Some("MSFT")).await.unwrap_err();
    assert!(err.to_string().starts_with("MSFT was not scored"));
    assert!(report(&s, &settings(), Some("IBM")).await.is_err());

    let listing = runs(&s, &settings(), 10).await.unwrap();
    assert_eq!(listing.lines().count(), 2);
  }

  #[tokio::test]
  async fn export_writes_one_file_per_sheet() {
    let s = store().await;
    ingest_text(&s, &settings(), AAPL, None).await.unwrap();
    run(&s, &settings()).await.unwrap();

    let dir = std::env::temp_dir().join(format!("finhealth-export-{}", std::process::id()));
    let paths = export(&s, &settings(), &dir).await.unwrap();
    assert_eq!(paths.len(), 7);
    assert!(paths.iter().all(|p| p.exists()));
    std::fs::remove_dir_all(&dir).ok();
  }
}
