//! Companies and fiscal periods: the reference keys every layer is indexed by.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

/// A company in the configured universe. Created once from configuration and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
  pub ticker: String,
  pub name:   String,
}

impl Company {
  pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
    Self { ticker: ticker.into(), name: name.into() }
  }
}

/// The ten technology companies the pipeline tracks when no universe is
/// configured.
pub fn default_universe() -> Vec<Company> {
  [
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("META", "Meta Platforms Inc."),
    ("TSLA", "Tesla Inc."),
    ("AVGO", "Broadcom Inc."),
    ("ASML", "ASML Holding N.V."),
    ("NFLX", "Netflix Inc."),
  ]
  .into_iter()
  .map(|(ticker, name)| Company::new(ticker, name))
  .collect()
}

/// Reporting cadence of a statement.
///
/// Declaration order matters: `Annual` sorts before `Quarterly`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PeriodType {
  Annual,
  Quarterly,
}

impl PeriodType {
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownPeriodType(s.to_owned()))
  }
}

/// A reporting snapshot for one company.
///
/// Ordering is by ticker, then end date, then period type, so a sorted
/// collection of periods groups by company and runs oldest to newest.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FiscalPeriod {
  pub ticker:      String,
  pub end_date:    NaiveDate,
  pub period_type: PeriodType,
}

impl FiscalPeriod {
  pub fn new(
    ticker: impl Into<String>,
    end_date: NaiveDate,
    period_type: PeriodType,
  ) -> Self {
    Self { ticker: ticker.into(), end_date, period_type }
  }

  pub fn annual(ticker: impl Into<String>, end_date: NaiveDate) -> Self {
    Self::new(ticker, end_date, PeriodType::Annual)
  }

  /// Recency key used to pick the period a company is scored on: latest end
  /// date first, and on a tie the annual figures win.
  pub fn recency(&self) -> (NaiveDate, std::cmp::Reverse<PeriodType>) {
    (self.end_date, std::cmp::Reverse(self.period_type))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn period_type_parses_case_insensitively() {
    assert_eq!(PeriodType::parse("Annual").unwrap(), PeriodType::Annual);
    assert_eq!(PeriodType::parse(" quarterly ").unwrap(), PeriodType::Quarterly);
    assert!(PeriodType::parse("monthly").is_err());
  }

  #[test]
  fn periods_sort_by_company_then_date() {
    let mut periods = vec![
      FiscalPeriod::annual("MSFT", date(2023, 6, 30)),
      FiscalPeriod::annual("AAPL", date(2024, 9, 28)),
      FiscalPeriod::annual("AAPL", date(2023, 9, 30)),
    ];
    periods.sort();
    assert_eq!(periods[0].end_date, date(2023, 9, 30));
    assert_eq!(periods[1].end_date, date(2024, 9, 28));
    assert_eq!(periods[2].ticker, "MSFT");
  }

  #[test]
  fn annual_wins_recency_tie() {
    let annual = FiscalPeriod::annual("AAPL", date(2024, 9, 28));
    let quarterly =
      FiscalPeriod::new("AAPL", date(2024, 9, 28), PeriodType::Quarterly);
    assert!(annual.recency() > quarterly.recency());

    let later = FiscalPeriod::new("AAPL", date(2024, 12, 28), PeriodType::Quarterly);
    assert!(later.recency() > annual.recency());
  }

  #[test]
  fn default_universe_has_ten_companies() {
    let universe = default_universe();
    assert_eq!(universe.len(), 10);
    assert!(universe.iter().any(|c| c.ticker == "NVDA"));
  }
}
