//! Gold layer: KPIs derived from normalized facts.
//!
//! Every KPI is a pure function of specific canonical fields. A null input or
//! a disallowed denominator yields a null KPI; nothing here panics or produces
//! an infinite or NaN value.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
  Error, Result,
  company::{FiscalPeriod, PeriodType},
  fact::{FactMatrix, FactSet},
  vocab::CanonicalField as F,
};

// ─── Names ───────────────────────────────────────────────────────────────────

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KpiName {
  CurrentRatio,
  DebtToEquity,
  NetMargin,
  Roe,
  FreeCashFlow,
  CashRatio,
  GrossMargin,
  OperatingMargin,
  Roa,
  DebtToAssets,
  AssetTurnover,
  OperatingCashFlowRatio,
  FreeCashFlowMargin,
  RevenueGrowth,
  ProfitGrowth,
}

impl KpiName {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownKpi(s.to_owned()))
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
  pub period: FiscalPeriod,
  pub name:   KpiName,
  pub value:  Option<f64>,
}

/// KPI values for one period: the scorer's input.
pub type KpiSet = BTreeMap<KpiName, Option<f64>>;

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Compute every KPI for every period in `facts`.
///
/// Growth KPIs compare against the previous period of the same company and
/// period type; the oldest period of each series has null growth.
pub fn compute_kpis(facts: &FactMatrix) -> Vec<Kpi> {
  let mut prior: HashMap<(&str, PeriodType), &FactSet> = HashMap::new();
  let mut kpis = Vec::with_capacity(facts.len() * KpiName::iter().len());

  for (period, set) in facts {
    let key = (period.ticker.as_str(), period.period_type);
    let values = compute_period(set, prior.get(&key).copied());
    kpis.extend(values.into_iter().map(|(name, value)| Kpi {
      period: period.clone(),
      name,
      value,
    }));
    prior.insert(key, set);
  }

  kpis
}

/// Compute the KPI set for one period; `prior` feeds the growth KPIs.
pub fn compute_period(facts: &FactSet, prior: Option<&FactSet>) -> KpiSet {
  use Denominator::{NonZero, Positive};

  let revenue = facts.get(F::TotalRevenue);
  let net_income = facts.get(F::NetIncome);
  let equity = facts.get(F::TotalEquity);
  let assets = facts.get(F::TotalAssets);
  let liabilities = facts.get(F::TotalLiabilities);
  let current_liabilities = facts.get(F::CurrentLiabilities);
  let operating_cf = facts.get(F::OperatingCashFlow);

  // Providers disagree on the sign of capex; it is always an outflow. Without
  // both inputs, fall back to the provider's own free cash flow line.
  let free_cash_flow = match (operating_cf, facts.get(F::CapitalExpenditures)) {
    (Some(ocf), Some(capex)) => finite(ocf - capex.abs()),
    _ => facts.get(F::FreeCashFlow).and_then(finite),
  };

  let prior_revenue = prior.and_then(|p| p.get(F::TotalRevenue));
  let prior_net_income = prior.and_then(|p| p.get(F::NetIncome));

  KpiName::iter()
    .map(|name| {
      let value = match name {
        KpiName::CurrentRatio => {
          ratio(facts.get(F::CurrentAssets), current_liabilities, NonZero)
        }
        KpiName::DebtToEquity => ratio(liabilities, equity, Positive),
        KpiName::NetMargin => ratio(net_income, revenue, NonZero),
        KpiName::Roe => ratio(net_income, equity, Positive),
        KpiName::FreeCashFlow => free_cash_flow,
        KpiName::CashRatio => {
          ratio(facts.get(F::CashAndEquivalents), current_liabilities, NonZero)
        }
        KpiName::GrossMargin => ratio(facts.get(F::GrossProfit), revenue, NonZero),
        KpiName::OperatingMargin => {
          ratio(facts.get(F::OperatingIncome), revenue, NonZero)
        }
        KpiName::Roa => ratio(net_income, assets, Positive),
        KpiName::DebtToAssets => ratio(liabilities, assets, Positive),
        KpiName::AssetTurnover => ratio(revenue, assets, Positive),
        KpiName::OperatingCashFlowRatio => {
          ratio(operating_cf, current_liabilities, NonZero)
        }
        KpiName::FreeCashFlowMargin => ratio(free_cash_flow, revenue, NonZero),
        KpiName::RevenueGrowth => growth(revenue, prior_revenue),
        KpiName::ProfitGrowth => growth(net_income, prior_net_income),
      };
      (name, value)
    })
    .collect()
}

/// The most recent period's KPI set for each company, keyed by ticker.
///
/// Recency follows [`FiscalPeriod::recency`]: latest end date, annual first
/// on a tie.
pub fn latest_by_company(kpis: &[Kpi]) -> BTreeMap<String, (FiscalPeriod, KpiSet)> {
  let mut latest: BTreeMap<String, (FiscalPeriod, KpiSet)> = BTreeMap::new();
  for kpi in kpis {
    let entry = latest
      .entry(kpi.period.ticker.clone())
      .or_insert_with(|| (kpi.period.clone(), KpiSet::new()));
    if kpi.period.recency() > entry.0.recency() {
      *entry = (kpi.period.clone(), KpiSet::new());
    }
    if kpi.period == entry.0 {
      entry.1.insert(kpi.name, kpi.value);
    }
  }
  latest
}

// ─── Arithmetic ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Denominator {
  NonZero,
  Positive,
}

fn ratio(
  numerator: Option<f64>,
  denominator: Option<f64>,
  rule: Denominator,
) -> Option<f64> {
  let (n, d) = (numerator?, denominator?);
  let allowed = match rule {
    Denominator::NonZero => d != 0.0,
    Denominator::Positive => d > 0.0,
  };
  if !allowed {
    return None;
  }
  finite(n / d)
}

fn growth(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
  let (c, p) = (current?, previous?);
  if p == 0.0 {
    return None;
  }
  finite((c - p) / p.abs())
}

fn finite(v: f64) -> Option<f64> { v.is_finite().then_some(v) }

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn period(ticker: &str, year: i32) -> FiscalPeriod {
    FiscalPeriod::annual(ticker, NaiveDate::from_ymd_opt(year, 12, 31).unwrap())
  }

  fn set(values: &[(F, f64)]) -> FactSet {
    values.iter().map(|(f, v)| (*f, Some(*v))).collect()
  }

  fn close(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
  }

  #[test]
  fn reference_ratios() {
    let facts = set(&[
      (F::CurrentAssets, 200.0),
      (F::CurrentLiabilities, 100.0),
      (F::TotalLiabilities, 300.0),
      (F::TotalEquity, 150.0),
      (F::NetIncome, 50.0),
      (F::TotalRevenue, 500.0),
    ]);
    let kpis = compute_period(&facts, None);
    assert!(close(kpis[&KpiName::CurrentRatio], 2.0));
    assert!(close(kpis[&KpiName::DebtToEquity], 2.0));
    assert!(close(kpis[&KpiName::NetMargin], 0.10));
    assert!(close(kpis[&KpiName::Roe], 50.0 / 150.0));
  }

  #[test]
  fn zero_equity_nulls_leverage_and_returns() {
    let facts = set(&[
      (F::TotalLiabilities, 300.0),
      (F::TotalEquity, 0.0),
      (F::NetIncome, 50.0),
    ]);
    let kpis = compute_period(&facts, None);
    assert_eq!(kpis[&KpiName::DebtToEquity], None);
    assert_eq!(kpis[&KpiName::Roe], None);
  }

  #[test]
  fn negative_equity_is_disallowed() {
    let facts = set(&[(F::TotalLiabilities, 300.0), (F::TotalEquity, -20.0)]);
    let kpis = compute_period(&facts, None);
    assert_eq!(kpis[&KpiName::DebtToEquity], None);
  }

  #[test]
  fn zero_denominators_never_produce_infinity() {
    let facts = set(&[
      (F::CurrentAssets, 10.0),
      (F::CurrentLiabilities, 0.0),
      (F::CashAndEquivalents, 5.0),
      (F::NetIncome, 1.0),
      (F::GrossProfit, 1.0),
      (F::OperatingIncome, 1.0),
      (F::TotalRevenue, 0.0),
      (F::TotalAssets, 0.0),
      (F::TotalLiabilities, 1.0),
      (F::TotalEquity, 0.0),
      (F::OperatingCashFlow, 1.0),
      (F::CapitalExpenditures, 1.0),
    ]);
    let kpis = compute_period(&facts, Some(&set(&[(F::TotalRevenue, 0.0), (F::NetIncome, 0.0)])));
    for (name, value) in &kpis {
      if *name == KpiName::FreeCashFlow {
        assert_eq!(*value, Some(0.0));
      } else {
        assert_eq!(*value, None, "{name} should be null");
      }
    }
  }

  #[test]
  fn missing_inputs_propagate_null() {
    let kpis = compute_period(&FactSet::new(), None);
    assert_eq!(kpis.len(), KpiName::iter().len());
    assert!(kpis.values().all(Option::is_none));
  }

  #[test]
  fn free_cash_flow_treats_capex_as_outflow() {
    let negative = set(&[(F::OperatingCashFlow, 118.0), (F::CapitalExpenditures, -9.0)]);
    let positive = set(&[(F::OperatingCashFlow, 118.0), (F::CapitalExpenditures, 9.0)]);
    assert!(close(compute_period(&negative, None)[&KpiName::FreeCashFlow], 109.0));
    assert!(close(compute_period(&positive, None)[&KpiName::FreeCashFlow], 109.0));

    let missing = set(&[(F::OperatingCashFlow, 118.0)]);
    assert_eq!(compute_period(&missing, None)[&KpiName::FreeCashFlow], None);
  }

  #[test]
  fn reported_free_cash_flow_fills_in_without_capex() {
    let reported = set(&[
      (F::TotalRevenue, 391035.0),
      (F::OperatingCashFlow, 118254.0),
      (F::FreeCashFlow, 108807.0),
    ]);
    let kpis = compute_period(&reported, None);
    assert!(close(kpis[&KpiName::FreeCashFlow], 108807.0));
    assert!(close(kpis[&KpiName::FreeCashFlowMargin], 108807.0 / 391035.0));

    // With both inputs present the derived figure wins over the reported one.
    let both = set(&[
      (F::OperatingCashFlow, 118.0),
      (F::CapitalExpenditures, -9.0),
      (F::FreeCashFlow, 100.0),
    ]);
    assert!(close(compute_period(&both, None)[&KpiName::FreeCashFlow], 109.0));
  }

  #[test]
  fn growth_uses_prior_period_of_same_company() {
    let mut matrix = FactMatrix::new();
    matrix.insert(period("AAPL", 2023), set(&[(F::TotalRevenue, 100.0), (F::NetIncome, -10.0)]));
    matrix.insert(period("AAPL", 2024), set(&[(F::TotalRevenue, 125.0), (F::NetIncome, 5.0)]));
    matrix.insert(period("MSFT", 2024), set(&[(F::TotalRevenue, 50.0)]));

    let kpis = compute_kpis(&matrix);
    let find = |ticker: &str, year: i32, name: KpiName| {
      kpis
        .iter()
        .find(|k| k.period == period(ticker, year) && k.name == name)
        .and_then(|k| k.value)
    };

    assert_eq!(find("AAPL", 2023, KpiName::RevenueGrowth), None);
    assert!(close(find("AAPL", 2024, KpiName::RevenueGrowth), 0.25));
    assert!(close(find("AAPL", 2024, KpiName::ProfitGrowth), 1.5));
    assert_eq!(find("MSFT", 2024, KpiName::RevenueGrowth), None);
  }

  #[test]
  fn every_period_gets_every_kpi() {
    let mut matrix = FactMatrix::new();
    matrix.insert(period("AAPL", 2023), FactSet::new());
    matrix.insert(period("AAPL", 2024), FactSet::new());
    assert_eq!(compute_kpis(&matrix).len(), 2 * KpiName::iter().len());
  }

  #[test]
  fn latest_by_company_picks_most_recent_period() {
    let mut matrix = FactMatrix::new();
    matrix.insert(period("AAPL", 2023), set(&[(F::TotalRevenue, 1.0), (F::NetIncome, 1.0)]));
    matrix.insert(period("AAPL", 2024), set(&[(F::TotalRevenue, 2.0), (F::NetIncome, 1.0)]));
    let kpis = compute_kpis(&matrix);

    let latest = latest_by_company(&kpis);
    let (p, set) = &latest["AAPL"];
    assert_eq!(*p, period("AAPL", 2024));
    assert!(close(set[&KpiName::NetMargin], 0.5));
    assert_eq!(set.len(), KpiName::iter().len());
  }
}
