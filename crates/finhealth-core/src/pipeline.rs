//! Pipeline orchestration: bronze rows → facts → KPIs → health scores.
//!
//! Each company is an independent partition. Partitions run on the rayon pool
//! with the field map and scorer shared read-only; results are concatenated in
//! ticker order, so the output never depends on scheduling.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Result,
  company::Company,
  config::ScoringConfig,
  digest::{LayerDigests, digest_records},
  fact::{NormalizedFact, pivot},
  kpi::{Kpi, compute_kpis, latest_by_company},
  normalize::normalize,
  score::{HealthScore, Scorer},
  statement::RawStatementRow,
  vocab::FieldMap,
};

/// A company that produced no health score in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFailure {
  pub ticker: String,
  pub reason: String,
}

/// Row counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
  /// Bronze rows belonging to the universe.
  pub raw_rows:     usize,
  /// Bronze rows for tickers outside the universe.
  pub dropped_rows: usize,
  pub facts:        usize,
  pub unmapped:     usize,
  pub unparseable:  usize,
  pub overwritten:  usize,
  pub kpis:         usize,
  pub scored:       usize,
  pub failed:       usize,
}

/// Everything a run produces, ready to persist.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
  pub companies: Vec<Company>,
  pub facts:     Vec<NormalizedFact>,
  pub kpis:      Vec<Kpi>,
  pub scores:    Vec<HealthScore>,
  pub failures:  Vec<ScoreFailure>,
  pub stats:     RunStats,
  pub digests:   LayerDigests,
}

struct Partition {
  facts:       Vec<NormalizedFact>,
  kpis:        Vec<Kpi>,
  outcome:     std::result::Result<HealthScore, ScoreFailure>,
  unmapped:    usize,
  unparseable: usize,
  overwritten: usize,
}

/// Run the full pipeline over `rows` for the companies in `universe`.
///
/// The configuration is validated before any company is touched; an invalid
/// configuration is the only error this returns. Per-company trouble lands in
/// [`RunOutput::failures`].
pub fn run(
  config: &ScoringConfig,
  field_map: &FieldMap,
  universe: &[Company],
  rows: &[RawStatementRow],
) -> Result<RunOutput> {
  let scorer = Scorer::new(config.clone())?;
  if field_map.version() != config.version {
    return Err(Error::Configuration(format!(
      "field map is vocabulary v{}, scoring configuration is v{}",
      field_map.version(),
      config.version
    )));
  }

  // Ingest stores tickers uppercased; configured ones may be written either way.
  let mut companies: Vec<Company> = universe
    .iter()
    .map(|c| Company::new(c.ticker.trim().to_uppercase(), &c.name))
    .collect();
  companies.sort_by(|a, b| a.ticker.cmp(&b.ticker));
  companies.dedup_by(|a, b| a.ticker == b.ticker);

  let known: BTreeSet<&str> = companies.iter().map(|c| c.ticker.as_str()).collect();
  let mut by_ticker: BTreeMap<&str, Vec<RawStatementRow>> = BTreeMap::new();
  let mut dropped: BTreeMap<&str, usize> = BTreeMap::new();
  for row in rows {
    if known.contains(row.ticker()) {
      by_ticker.entry(row.ticker()).or_default().push(row.clone());
    } else {
      *dropped.entry(row.ticker()).or_default() += 1;
    }
  }
  for (ticker, count) in &dropped {
    warn!(%ticker, rows = count, "dropping rows for ticker outside the universe");
  }

  info!(
    companies = companies.len(),
    rows = rows.len(),
    "starting pipeline run"
  );

  let partitions: Vec<Partition> = companies
    .par_iter()
    .map(|company| {
      let rows = by_ticker
        .get(company.ticker.as_str())
        .map(Vec::as_slice)
        .unwrap_or_default();
      process(&company.ticker, rows, field_map, &scorer)
    })
    .collect();

  let mut output = RunOutput {
    companies,
    ..Default::default()
  };
  output.stats.raw_rows = by_ticker.values().map(Vec::len).sum();
  output.stats.dropped_rows = dropped.values().sum();

  for partition in partitions {
    output.stats.unmapped += partition.unmapped;
    output.stats.unparseable += partition.unparseable;
    output.stats.overwritten += partition.overwritten;
    output.facts.extend(partition.facts);
    output.kpis.extend(partition.kpis);
    match partition.outcome {
      Ok(score) => output.scores.push(score),
      Err(failure) => {
        warn!(ticker = %failure.ticker, reason = %failure.reason, "company not scored");
        output.failures.push(failure);
      }
    }
  }

  output.stats.facts = output.facts.len();
  output.stats.kpis = output.kpis.len();
  output.stats.scored = output.scores.len();
  output.stats.failed = output.failures.len();

  let bronze: Vec<&RawStatementRow> = by_ticker.values().flatten().collect();
  output.digests = LayerDigests {
    bronze: digest_records(&bronze)?,
    silver: digest_records(&output.facts)?,
    gold:   digest_records(&output.kpis)?,
    scores: digest_records(&output.scores)?,
  };

  info!(
    facts = output.stats.facts,
    kpis = output.stats.kpis,
    unmapped = output.stats.unmapped,
    unparseable = output.stats.unparseable,
    overwritten = output.stats.overwritten,
    dropped = output.stats.dropped_rows,
    scored = output.stats.scored,
    failed = output.stats.failed,
    "pipeline run complete"
  );
  Ok(output)
}

fn process(
  ticker: &str,
  rows: &[RawStatementRow],
  field_map: &FieldMap,
  scorer: &Scorer,
) -> Partition {
  let normalized = normalize(field_map, rows);
  let unmapped = normalized.unmapped();
  let unparseable = normalized.unparseable();
  let kpis = compute_kpis(&pivot(&normalized.facts));

  let outcome = match latest_by_company(&kpis).remove(ticker) {
    Some((period, set)) => scorer.score(&period, &set),
    None => Err(Error::InsufficientData(ticker.to_owned())),
  }
  .map_err(|e| ScoreFailure {
    ticker: ticker.to_owned(),
    reason: e.to_string(),
  });

  Partition {
    facts: normalized.facts,
    kpis,
    outcome,
    unmapped,
    unparseable,
    overwritten: normalized.overwritten,
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    company::{FiscalPeriod, default_universe},
    kpi::KpiName,
    score::Rating,
    vocab::StatementType,
  };

  fn rows_for(ticker: &str) -> Vec<RawStatementRow> {
    let period =
      FiscalPeriod::annual(ticker, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    [
      (StatementType::Balance, "Current Assets", "200"),
      (StatementType::Balance, "Current Liabilities", "100"),
      (StatementType::Balance, "Total Liabilities", "300"),
      (StatementType::Balance, "Total Equity", "150"),
      (StatementType::Income, "Total Revenue", "500"),
      (StatementType::Income, "Net Income", "50"),
    ]
    .into_iter()
    .map(|(statement, name, value)| {
      RawStatementRow::new(period.clone(), statement, name, Some(value))
    })
    .collect()
  }

  fn all_but(skip: &str) -> Vec<RawStatementRow> {
    default_universe()
      .iter()
      .filter(|c| c.ticker != skip)
      .flat_map(|c| rows_for(&c.ticker))
      .collect()
  }

  #[test]
  fn missing_company_fails_alone() {
    let out = run(
      &ScoringConfig::default(),
      &FieldMap::builtin(),
      &default_universe(),
      &all_but("TSLA"),
    )
    .unwrap();

    assert_eq!(out.scores.len(), 9);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].ticker, "TSLA");
    assert!(out.failures[0].reason.contains("insufficient data"));
    assert_eq!(out.stats.scored, 9);
    assert_eq!(out.stats.failed, 1);
  }

  #[test]
  fn reference_inputs_flow_through_every_layer() {
    let universe = vec![Company::new("AAPL", "Apple Inc.")];
    let out = run(
      &ScoringConfig::default(),
      &FieldMap::builtin(),
      &universe,
      &rows_for("AAPL"),
    )
    .unwrap();

    assert_eq!(out.facts.len(), 6);
    let kpi = |name: KpiName| out.kpis.iter().find(|k| k.name == name).unwrap().value;
    assert_eq!(kpi(KpiName::CurrentRatio), Some(2.0));
    assert_eq!(kpi(KpiName::DebtToEquity), Some(2.0));
    assert_eq!(kpi(KpiName::NetMargin), Some(0.1));

    // liquidity 100, leverage 50, profitability 75, returns 100, cash null → 50
    let score = &out.scores[0];
    assert!((score.composite - 75.0).abs() < 1e-9);
    assert_eq!(score.rating, Rating::Good);
  }

  #[test]
  fn rows_outside_universe_are_dropped() {
    let universe = vec![Company::new("AAPL", "Apple Inc.")];
    let mut rows = rows_for("AAPL");
    rows.extend(rows_for("IBM"));
    let out =
      run(&ScoringConfig::default(), &FieldMap::builtin(), &universe, &rows).unwrap();

    assert_eq!(out.stats.raw_rows, 6);
    assert_eq!(out.stats.dropped_rows, 6);
    assert!(out.facts.iter().all(|f| f.period.ticker == "AAPL"));
  }

  #[test]
  fn invalid_config_aborts_before_scoring() {
    let mut config = ScoringConfig::default();
    config.categories[0].weight = 0.9;
    let err = run(
      &config,
      &FieldMap::builtin(),
      &default_universe(),
      &all_but(""),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
  }

  #[test]
  fn identical_input_gives_identical_digests() {
    let universe = default_universe();
    let rows = all_but("");
    let mut reversed = rows.clone();
    reversed.reverse();

    let config = ScoringConfig::default();
    let map = FieldMap::builtin();
    let a = run(&config, &map, &universe, &rows).unwrap();
    let b = run(&config, &map, &universe, &reversed).unwrap();
    assert_eq!(a.digests, b.digests);
    assert_eq!(a.scores, b.scores);
  }

  #[test]
  fn output_is_in_ticker_order() {
    let out = run(
      &ScoringConfig::default(),
      &FieldMap::builtin(),
      &default_universe(),
      &all_but(""),
    )
    .unwrap();
    let tickers: Vec<_> = out.scores.iter().map(|s| s.ticker()).collect();
    let mut sorted = tickers.clone();
    sorted.sort();
    assert_eq!(tickers, sorted);
  }

  #[test]
  fn universe_tickers_match_regardless_of_case() {
    let universe = vec![Company::new(" aapl ", "Apple Inc.")];
    let out = run(
      &ScoringConfig::default(),
      &FieldMap::builtin(),
      &universe,
      &rows_for("AAPL"),
    )
    .unwrap();

    assert_eq!(out.companies, vec![Company::new("AAPL", "Apple Inc.")]);
    assert_eq!(out.scores.len(), 1);
    assert_eq!(out.stats.dropped_rows, 0);
  }

  #[test]
  fn recoverable_issues_are_counted() {
    let period =
      FiscalPeriod::annual("AAPL", NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    let mut rows = rows_for("AAPL");
    rows.extend([
      RawStatementRow::new(period.clone(), StatementType::Income, "Mystery Line", Some("1")),
      RawStatementRow::new(period.clone(), StatementType::Income, "Net Income", Some("abc")),
    ]);
    let out = run(
      &ScoringConfig::default(),
      &FieldMap::builtin(),
      &[Company::new("AAPL", "Apple Inc.")],
      &rows,
    )
    .unwrap();

    assert_eq!(out.stats.unmapped, 1);
    assert_eq!(out.stats.unparseable, 1);
    assert_eq!(out.stats.overwritten, 1);
  }
}
