//! [`SqliteStore`], the SQLite implementation of [`LayerStore`].

use std::path::Path;

use tracing::{debug, warn};

use finhealth_core::{
  company::Company,
  fact::NormalizedFact,
  kpi::Kpi,
  pipeline::{RunOutput, ScoreFailure},
  score::HealthScore,
  statement::RawStatementRow,
  store::{LayerStore, RunRecord},
  vocab::StatementType,
};

use crate::{
  Result,
  encode::{RawBronzeRow, RawMeasure, RawRun, RawScore},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A layer store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read a `facts`-shaped table (`facts` or `kpis`).
  async fn load_measures(&self, sql: &'static str) -> Result<Vec<RawMeasure>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawMeasure {
              ticker:      row.get(0)?,
              period_end:  row.get(1)?,
              period_type: row.get(2)?,
              name:        row.get(3)?,
              value:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws)
  }
}

// ─── LayerStore impl ─────────────────────────────────────────────────────────

impl LayerStore for SqliteStore {
  type Error = crate::Error;

  // ── Bronze ────────────────────────────────────────────────────────────────

  async fn replace_raw_partition(
    &self,
    ticker: String,
    statement: StatementType,
    mut rows: Vec<RawStatementRow>,
  ) -> Result<usize> {
    let before = rows.len();
    rows.retain(|r| r.ticker() == ticker && r.statement == statement);
    if rows.len() != before {
      warn!(
        %ticker,
        %statement,
        skipped = before - rows.len(),
        "ignoring rows outside the partition being replaced"
      );
    }

    let raws: Vec<RawBronzeRow> = rows.iter().map(RawBronzeRow::encode).collect();
    let statement_str = statement.to_string();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM raw_rows WHERE ticker = ?1 AND statement = ?2",
          rusqlite::params![ticker, statement_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO raw_rows
               (ticker, period_end, period_type, statement, field_name_raw, value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for r in &raws {
            stmt.execute(rusqlite::params![
              r.ticker,
              r.period_end,
              r.period_type,
              r.statement,
              r.field_name_raw,
              r.value,
            ])?;
          }
        }
        tx.commit()?;
        Ok(raws.len())
      })
      .await?;

    debug!(rows = written, "replaced bronze partition");
    Ok(written)
  }

  async fn load_raw_rows(&self) -> Result<Vec<RawStatementRow>> {
    let raws: Vec<RawBronzeRow> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT ticker, period_end, period_type, statement, field_name_raw, value
           FROM raw_rows ORDER BY seq",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawBronzeRow {
              ticker:         row.get(0)?,
              period_end:     row.get(1)?,
              period_type:    row.get(2)?,
              statement:      row.get(3)?,
              field_name_raw: row.get(4)?,
              value:          row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBronzeRow::into_row).collect()
  }

  // ── Derived layers ────────────────────────────────────────────────────────

  async fn publish_run(&self, output: RunOutput, record: RunRecord) -> Result<()> {
    let companies: Vec<(String, String)> = output
      .companies
      .into_iter()
      .map(|c| (c.ticker, c.name))
      .collect();
    let facts: Vec<RawMeasure> = output.facts.iter().map(RawMeasure::from_fact).collect();
    let kpis: Vec<RawMeasure> = output.kpis.iter().map(RawMeasure::from_kpi).collect();
    let scores = output
      .scores
      .iter()
      .map(RawScore::encode)
      .collect::<Result<Vec<_>>>()?;
    let failures: Vec<(String, String)> = output
      .failures
      .into_iter()
      .map(|f| (f.ticker, f.reason))
      .collect();
    let run = RawRun::encode(&record)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "DELETE FROM companies;
           DELETE FROM facts;
           DELETE FROM kpis;
           DELETE FROM scores;
           DELETE FROM score_failures;",
        )?;

        {
          let mut stmt =
            tx.prepare("INSERT INTO companies (ticker, name) VALUES (?1, ?2)")?;
          for (ticker, name) in &companies {
            stmt.execute(rusqlite::params![ticker, name])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO facts (ticker, period_end, period_type, field, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for m in &facts {
            stmt.execute(rusqlite::params![
              m.ticker, m.period_end, m.period_type, m.name, m.value
            ])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO kpis (ticker, period_end, period_type, kpi, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for m in &kpis {
            stmt.execute(rusqlite::params![
              m.ticker, m.period_end, m.period_type, m.name, m.value
            ])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO scores
               (ticker, period_end, period_type, composite, rating, sub_scores, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for s in &scores {
            stmt.execute(rusqlite::params![
              s.ticker,
              s.period_end,
              s.period_type,
              s.composite,
              s.rating,
              s.sub_scores,
              s.notes,
            ])?;
          }

          let mut stmt =
            tx.prepare("INSERT INTO score_failures (ticker, reason) VALUES (?1, ?2)")?;
          for (ticker, reason) in &failures {
            stmt.execute(rusqlite::params![ticker, reason])?;
          }
        }

        tx.execute(
          "INSERT INTO runs
             (run_id, started_at, finished_at, vocabulary_version, stats, digests)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            run.run_id,
            run.started_at,
            run.finished_at,
            run.vocabulary_version,
            run.stats,
            run.digests,
          ],
        )?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(run_id = %record.run_id, "published run");
    Ok(())
  }

  async fn list_companies(&self) -> Result<Vec<Company>> {
    let companies = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT ticker, name FROM companies ORDER BY ticker")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Company {
              ticker: row.get(0)?,
              name:   row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(companies)
  }

  async fn load_facts(&self) -> Result<Vec<NormalizedFact>> {
    let mut facts = self
      .load_measures("SELECT ticker, period_end, period_type, field, value FROM facts")
      .await?
      .into_iter()
      .map(RawMeasure::into_fact)
      .collect::<Result<Vec<_>>>()?;
    facts.sort_by(|a, b| (&a.period, a.field).cmp(&(&b.period, b.field)));
    Ok(facts)
  }

  async fn load_kpis(&self) -> Result<Vec<Kpi>> {
    let mut kpis = self
      .load_measures("SELECT ticker, period_end, period_type, kpi, value FROM kpis")
      .await?
      .into_iter()
      .map(RawMeasure::into_kpi)
      .collect::<Result<Vec<_>>>()?;
    kpis.sort_by(|a, b| (&a.period, a.name).cmp(&(&b.period, b.name)));
    Ok(kpis)
  }

  async fn load_scores(&self) -> Result<Vec<HealthScore>> {
    let raws: Vec<RawScore> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT ticker, period_end, period_type, composite, rating, sub_scores, notes
           FROM scores ORDER BY ticker",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawScore {
              ticker:      row.get(0)?,
              period_end:  row.get(1)?,
              period_type: row.get(2)?,
              composite:   row.get(3)?,
              rating:      row.get(4)?,
              sub_scores:  row.get(5)?,
              notes:       row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScore::into_score).collect()
  }

  async fn load_failures(&self) -> Result<Vec<ScoreFailure>> {
    let failures = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT ticker, reason FROM score_failures ORDER BY ticker")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(ScoreFailure { ticker: row.get(0)?, reason: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(failures)
  }

  // ── Run ledger ────────────────────────────────────────────────────────────

  async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, started_at, finished_at, vocabulary_version, stats, digests
           FROM runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |row| {
            Ok(RawRun {
              run_id:             row.get(0)?,
              started_at:         row.get(1)?,
              finished_at:        row.get(2)?,
              vocabulary_version: row.get(3)?,
              stats:              row.get(4)?,
              digests:            row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_run).collect()
  }
}
