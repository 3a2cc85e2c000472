//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and period end dates as
//! `YYYY-MM-DD`. Vocabulary values use their canonical string forms. Nested
//! structures (sub-scores, notes, run stats, digests) are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use finhealth_core::{
  company::{FiscalPeriod, PeriodType},
  fact::NormalizedFact,
  kpi::{Kpi, KpiName},
  score::{HealthScore, Rating},
  statement::RawStatementRow,
  store::RunRecord,
  vocab::{CanonicalField, StatementType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Periods ─────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// `(ticker, period_end, period_type)` column values.
pub fn encode_period(p: &FiscalPeriod) -> (String, String, String) {
  (p.ticker.clone(), encode_date(p.end_date), p.period_type.to_string())
}

pub fn decode_period(ticker: String, end: &str, period_type: &str) -> Result<FiscalPeriod> {
  Ok(FiscalPeriod::new(
    ticker,
    decode_date(end)?,
    PeriodType::parse(period_type)?,
  ))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `raw_rows` row.
pub struct RawBronzeRow {
  pub ticker:         String,
  pub period_end:     String,
  pub period_type:    String,
  pub statement:      String,
  pub field_name_raw: String,
  pub value:          Option<String>,
}

impl RawBronzeRow {
  pub fn encode(row: &RawStatementRow) -> Self {
    let (ticker, period_end, period_type) = encode_period(&row.period);
    Self {
      ticker,
      period_end,
      period_type,
      statement: row.statement.to_string(),
      field_name_raw: row.field_name_raw.clone(),
      value: row.value.clone(),
    }
  }

  pub fn into_row(self) -> Result<RawStatementRow> {
    Ok(RawStatementRow {
      period:         decode_period(self.ticker, &self.period_end, &self.period_type)?,
      statement:      StatementType::parse(&self.statement)?,
      field_name_raw: self.field_name_raw,
      value:          self.value,
    })
  }
}

/// A `facts` or `kpis` row: a period key, a name, and a nullable value.
pub struct RawMeasure {
  pub ticker:      String,
  pub period_end:  String,
  pub period_type: String,
  pub name:        String,
  pub value:       Option<f64>,
}

impl RawMeasure {
  pub fn from_fact(fact: &NormalizedFact) -> Self {
    Self::encode(&fact.period, fact.field.to_string(), fact.value)
  }

  pub fn from_kpi(kpi: &Kpi) -> Self {
    Self::encode(&kpi.period, kpi.name.to_string(), kpi.value)
  }

  fn encode(period: &FiscalPeriod, name: String, value: Option<f64>) -> Self {
    let (ticker, period_end, period_type) = encode_period(period);
    Self { ticker, period_end, period_type, name, value }
  }

  pub fn into_fact(self) -> Result<NormalizedFact> {
    Ok(NormalizedFact {
      field:  CanonicalField::parse(&self.name)?,
      period: decode_period(self.ticker, &self.period_end, &self.period_type)?,
      value:  self.value,
    })
  }

  pub fn into_kpi(self) -> Result<Kpi> {
    Ok(Kpi {
      name:   KpiName::parse(&self.name)?,
      period: decode_period(self.ticker, &self.period_end, &self.period_type)?,
      value:  self.value,
    })
  }
}

/// Raw strings read directly from a `scores` row.
pub struct RawScore {
  pub ticker:      String,
  pub period_end:  String,
  pub period_type: String,
  pub composite:   f64,
  pub rating:      String,
  pub sub_scores:  String,
  pub notes:       String,
}

impl RawScore {
  pub fn encode(score: &HealthScore) -> Result<Self> {
    let (ticker, period_end, period_type) = encode_period(&score.period);
    Ok(Self {
      ticker,
      period_end,
      period_type,
      composite: score.composite,
      rating: score.rating.to_string(),
      sub_scores: serde_json::to_string(&score.sub_scores)?,
      notes: serde_json::to_string(&score.notes)?,
    })
  }

  pub fn into_score(self) -> Result<HealthScore> {
    Ok(HealthScore {
      period:     decode_period(self.ticker, &self.period_end, &self.period_type)?,
      composite:  self.composite,
      rating:     Rating::parse(&self.rating)?,
      sub_scores: serde_json::from_str(&self.sub_scores)?,
      notes:      serde_json::from_str(&self.notes)?,
    })
  }
}

/// Raw strings read directly from a `runs` row.
pub struct RawRun {
  pub run_id:             String,
  pub started_at:         String,
  pub finished_at:        String,
  pub vocabulary_version: u32,
  pub stats:              String,
  pub digests:            String,
}

impl RawRun {
  pub fn encode(run: &RunRecord) -> Result<Self> {
    Ok(Self {
      run_id:             encode_uuid(run.run_id),
      started_at:         encode_dt(run.started_at),
      finished_at:        encode_dt(run.finished_at),
      vocabulary_version: run.vocabulary_version,
      stats:              serde_json::to_string(&run.stats)?,
      digests:            serde_json::to_string(&run.digests)?,
    })
  }

  pub fn into_run(self) -> Result<RunRecord> {
    Ok(RunRecord {
      run_id:             decode_uuid(&self.run_id)?,
      started_at:         decode_dt(&self.started_at)?,
      finished_at:        decode_dt(&self.finished_at)?,
      vocabulary_version: self.vocabulary_version,
      stats:              serde_json::from_str(&self.stats)?,
      digests:            serde_json::from_str(&self.digests)?,
    })
  }
}
