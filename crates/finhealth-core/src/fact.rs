//! Silver layer: normalized facts and their per-period pivots.
//!
//! A fact is one canonical line item for one (company, period). Absent values
//! are `None`, never a sentinel number, so a missing figure can never be
//! mistaken for a reported zero downstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
  company::FiscalPeriod,
  vocab::{CanonicalField, StatementType},
};

// ─── NormalizedFact ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFact {
  pub period: FiscalPeriod,
  pub field:  CanonicalField,
  pub value:  Option<f64>,
}

// ─── FactSet ─────────────────────────────────────────────────────────────────

/// All canonical values known for one period. A field missing from the map
/// and a field present with `None` both read as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSet(BTreeMap<CanonicalField, Option<f64>>);

impl FactSet {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, field: CanonicalField, value: Option<f64>) {
    self.0.insert(field, value);
  }

  pub fn get(&self, field: CanonicalField) -> Option<f64> {
    self.0.get(&field).copied().flatten()
  }

  pub fn contains(&self, field: CanonicalField) -> bool {
    self.0.contains_key(&field)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, Option<f64>)> + '_ {
    self.0.iter().map(|(f, v)| (*f, *v))
  }
}

impl FromIterator<(CanonicalField, Option<f64>)> for FactSet {
  fn from_iter<I: IntoIterator<Item = (CanonicalField, Option<f64>)>>(
    iter: I,
  ) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// Facts keyed by period: the KPI engine's input.
pub type FactMatrix = BTreeMap<FiscalPeriod, FactSet>;

/// Pivot long-form facts into one [`FactSet`] per period.
pub fn pivot(facts: &[NormalizedFact]) -> FactMatrix {
  let mut matrix = FactMatrix::new();
  for fact in facts {
    matrix
      .entry(fact.period.clone())
      .or_default()
      .insert(fact.field, fact.value);
  }
  matrix
}

// ─── Statement tables ────────────────────────────────────────────────────────

/// One canonical table per statement type: a row per (company, period) and a
/// typed column per canonical field of that statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTable {
  pub statement: StatementType,
  pub columns:   Vec<CanonicalField>,
  pub rows:      BTreeMap<FiscalPeriod, FactSet>,
}

impl StatementTable {
  /// Build the table for `statement`. Periods that reported nothing on this
  /// statement get no row.
  pub fn build(statement: StatementType, facts: &[NormalizedFact]) -> Self {
    let mut rows: BTreeMap<FiscalPeriod, FactSet> = BTreeMap::new();
    for fact in facts.iter().filter(|f| f.field.statement() == statement) {
      rows
        .entry(fact.period.clone())
        .or_default()
        .insert(fact.field, fact.value);
    }
    Self {
      statement,
      columns: CanonicalField::of_statement(statement),
      rows,
    }
  }

  /// The three statement tables in vocabulary order.
  pub fn all(facts: &[NormalizedFact]) -> Vec<Self> {
    StatementType::iter().map(|s| Self::build(s, facts)).collect()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn fact(ticker: &str, year: i32, field: CanonicalField, value: Option<f64>) -> NormalizedFact {
    NormalizedFact {
      period: FiscalPeriod::annual(ticker, NaiveDate::from_ymd_opt(year, 12, 31).unwrap()),
      field,
      value,
    }
  }

  #[test]
  fn null_and_missing_read_the_same() {
    let mut set = FactSet::new();
    set.insert(CanonicalField::NetIncome, None);
    assert_eq!(set.get(CanonicalField::NetIncome), None);
    assert_eq!(set.get(CanonicalField::TotalRevenue), None);
    assert!(set.contains(CanonicalField::NetIncome));
    assert!(!set.contains(CanonicalField::TotalRevenue));
  }

  #[test]
  fn pivot_groups_by_period() {
    let facts = vec![
      fact("AAPL", 2023, CanonicalField::NetIncome, Some(97.0)),
      fact("AAPL", 2024, CanonicalField::NetIncome, Some(94.0)),
      fact("AAPL", 2024, CanonicalField::TotalRevenue, Some(391.0)),
    ];
    let matrix = pivot(&facts);
    assert_eq!(matrix.len(), 2);
    let latest = matrix.values().last().unwrap();
    assert_eq!(latest.get(CanonicalField::TotalRevenue), Some(391.0));
    assert_eq!(latest.len(), 2);
  }

  #[test]
  fn statement_tables_split_by_statement() {
    let facts = vec![
      fact("AAPL", 2024, CanonicalField::NetIncome, Some(94.0)),
      fact("AAPL", 2024, CanonicalField::TotalAssets, Some(365.0)),
      fact("MSFT", 2024, CanonicalField::TotalAssets, None),
    ];
    let tables = StatementTable::all(&facts);
    assert_eq!(tables.len(), 3);

    let income = &tables[0];
    assert_eq!(income.statement, StatementType::Income);
    assert_eq!(income.rows.len(), 1);
    assert_eq!(income.columns.len(), 9);

    let balance = &tables[1];
    assert_eq!(balance.rows.len(), 2);

    let cashflow = &tables[2];
    assert!(cashflow.rows.is_empty());
  }
}
