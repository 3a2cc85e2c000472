//! The `LayerStore` trait and the run ledger.
//!
//! The trait is implemented by storage backends (e.g.
//! `finhealth-store-sqlite`). The CLI depends on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  company::Company,
  digest::LayerDigests,
  fact::NormalizedFact,
  kpi::Kpi,
  pipeline::{RunOutput, RunStats, ScoreFailure},
  score::HealthScore,
  statement::RawStatementRow,
  vocab::{StatementType, VOCABULARY_VERSION},
};

// ─── Run ledger ──────────────────────────────────────────────────────────────

/// One completed pipeline run. Appended, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub run_id:             Uuid,
  pub started_at:         DateTime<Utc>,
  pub finished_at:        DateTime<Utc>,
  pub vocabulary_version: u32,
  pub stats:              RunStats,
  pub digests:            LayerDigests,
}

impl RunRecord {
  /// Ledger entry for `output`, finishing now.
  pub fn new(started_at: DateTime<Utc>, output: &RunOutput) -> Self {
    Self {
      run_id: Uuid::new_v4(),
      started_at,
      finished_at: Utc::now(),
      vocabulary_version: VOCABULARY_VERSION,
      stats: output.stats,
      digests: output.digests.clone(),
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a layer store backend.
///
/// Bronze is replaced one (company, statement) partition at a time on ingest.
/// Every derived layer is replaced wholesale by [`LayerStore::publish_run`];
/// nothing is ever patched in place.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait LayerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Bronze ────────────────────────────────────────────────────────────

  /// Replace every raw row for `(ticker, statement)` with `rows`. Returns the
  /// number of rows written.
  fn replace_raw_partition(
    &self,
    ticker: String,
    statement: StatementType,
    rows: Vec<RawStatementRow>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// All raw rows in ingest order.
  fn load_raw_rows(
    &self,
  ) -> impl Future<Output = Result<Vec<RawStatementRow>, Self::Error>> + Send + '_;

  // ── Derived layers ────────────────────────────────────────────────────

  /// Atomically replace the company, silver, gold, and score tables with the
  /// contents of `output`, and append `record` to the run ledger.
  fn publish_run(
    &self,
    output: RunOutput,
    record: RunRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_companies(
    &self,
  ) -> impl Future<Output = Result<Vec<Company>, Self::Error>> + Send + '_;

  fn load_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<NormalizedFact>, Self::Error>> + Send + '_;

  fn load_kpis(
    &self,
  ) -> impl Future<Output = Result<Vec<Kpi>, Self::Error>> + Send + '_;

  fn load_scores(
    &self,
  ) -> impl Future<Output = Result<Vec<HealthScore>, Self::Error>> + Send + '_;

  fn load_failures(
    &self,
  ) -> impl Future<Output = Result<Vec<ScoreFailure>, Self::Error>> + Send + '_;

  // ── Run ledger ────────────────────────────────────────────────────────

  /// The most recent `limit` runs, newest first.
  fn list_runs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RunRecord>, Self::Error>> + Send + '_;
}
