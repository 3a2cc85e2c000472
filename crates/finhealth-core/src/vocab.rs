//! Controlled vocabularies shared by the normalizer, KPI engine, and scorer.
//!
//! The provider-to-canonical lookup is plain data: naming drift at the
//! provider is absorbed by adding a row to [`BUILTIN_ALIASES`] (or a
//! configured alias), never by adding a branch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

/// Version stamp for every controlled vocabulary in this crate (canonical
/// fields, KPI names, categories, rating labels). Bump it whenever one of them
/// changes; scoring configurations written against another version are
/// rejected.
pub const VOCABULARY_VERSION: u32 = 1;

// ─── Statement types ─────────────────────────────────────────────────────────

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
pub enum StatementType {
  #[strum(to_string = "income", serialize = "income_statement")]
  Income,
  #[strum(to_string = "balance", serialize = "balance-sheet", serialize = "balance_sheet")]
  Balance,
  #[strum(to_string = "cashflow", serialize = "cash-flow", serialize = "cash_flow")]
  Cashflow,
}

impl StatementType {
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownStatement(s.to_owned()))
  }

  /// Sheet title used by the report assembler.
  pub fn title(self) -> &'static str {
    match self {
      Self::Income => "Income Statement",
      Self::Balance => "Balance Sheet",
      Self::Cashflow => "Cash Flow",
    }
  }
}

// ─── Canonical fields ────────────────────────────────────────────────────────

/// A standardized financial line item, independent of provider naming.
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
pub enum CanonicalField {
  // ── Income ──────────────────────────────────────────────────────────────
  TotalRevenue,
  CostOfRevenue,
  GrossProfit,
  OperatingExpenses,
  OperatingIncome,
  NetIncome,
  Ebitda,
  EpsBasic,
  EpsDiluted,

  // ── Balance ─────────────────────────────────────────────────────────────
  TotalAssets,
  TotalLiabilities,
  TotalEquity,
  CurrentAssets,
  CurrentLiabilities,
  CashAndEquivalents,
  TotalDebt,
  RetainedEarnings,

  // ── Cash flow ───────────────────────────────────────────────────────────
  OperatingCashFlow,
  InvestingCashFlow,
  FinancingCashFlow,
  FreeCashFlow,
  CapitalExpenditures,
  DividendsPaid,
  NetChangeInCash,
}

impl CanonicalField {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownField(s.to_owned()))
  }

  /// The statement a field is reported on.
  pub fn statement(self) -> StatementType {
    use CanonicalField::*;
    match self {
      TotalRevenue | CostOfRevenue | GrossProfit | OperatingExpenses
      | OperatingIncome | NetIncome | Ebitda | EpsBasic | EpsDiluted => {
        StatementType::Income
      }
      TotalAssets | TotalLiabilities | TotalEquity | CurrentAssets
      | CurrentLiabilities | CashAndEquivalents | TotalDebt
      | RetainedEarnings => StatementType::Balance,
      OperatingCashFlow | InvestingCashFlow | FinancingCashFlow
      | FreeCashFlow | CapitalExpenditures | DividendsPaid
      | NetChangeInCash => StatementType::Cashflow,
    }
  }

  /// All fields of one statement, in vocabulary order.
  pub fn of_statement(statement: StatementType) -> Vec<Self> {
    Self::iter().filter(|f| f.statement() == statement).collect()
  }
}

// ─── Provider field map ──────────────────────────────────────────────────────

use CanonicalField as F;
use StatementType as S;

/// Provider vocabulary known to this build, version [`VOCABULARY_VERSION`].
///
/// Covers the stockanalysis-style labels and the yfinance statement index.
pub const BUILTIN_ALIASES: &[(StatementType, &str, CanonicalField)] = &[
  // Income
  (S::Income, "Revenue", F::TotalRevenue),
  (S::Income, "Total Revenue", F::TotalRevenue),
  (S::Income, "Net Sales", F::TotalRevenue),
  (S::Income, "Operating Revenue", F::TotalRevenue),
  (S::Income, "Cost of Revenue", F::CostOfRevenue),
  (S::Income, "Cost of Goods Sold", F::CostOfRevenue),
  (S::Income, "Gross Profit", F::GrossProfit),
  (S::Income, "Operating Expenses", F::OperatingExpenses),
  (S::Income, "Total Operating Expenses", F::OperatingExpenses),
  (S::Income, "Operating Expense", F::OperatingExpenses),
  (S::Income, "Operating Income", F::OperatingIncome),
  (S::Income, "Net Income", F::NetIncome),
  (S::Income, "Net Income Common", F::NetIncome),
  (S::Income, "Net Income Common Stockholders", F::NetIncome),
  (S::Income, "EBITDA", F::Ebitda),
  (S::Income, "EPS (Basic)", F::EpsBasic),
  (S::Income, "EPS Basic", F::EpsBasic),
  (S::Income, "Basic EPS", F::EpsBasic),
  (S::Income, "EPS (Diluted)", F::EpsDiluted),
  (S::Income, "EPS Diluted", F::EpsDiluted),
  (S::Income, "Diluted EPS", F::EpsDiluted),
  // Balance
  (S::Balance, "Total Assets", F::TotalAssets),
  (S::Balance, "Total Liabilities", F::TotalLiabilities),
  (S::Balance, "Total Liabilities Net Minority Interest", F::TotalLiabilities),
  (S::Balance, "Total Equity", F::TotalEquity),
  (S::Balance, "Shareholders' Equity", F::TotalEquity),
  (S::Balance, "Stockholders Equity", F::TotalEquity),
  (S::Balance, "Current Assets", F::CurrentAssets),
  (S::Balance, "Total Current Assets", F::CurrentAssets),
  (S::Balance, "Current Liabilities", F::CurrentLiabilities),
  (S::Balance, "Total Current Liabilities", F::CurrentLiabilities),
  (S::Balance, "Cash & Cash Equivalents", F::CashAndEquivalents),
  (S::Balance, "Cash and Cash Equivalents", F::CashAndEquivalents),
  (S::Balance, "Cash & Equivalents", F::CashAndEquivalents),
  (S::Balance, "Cash And Cash Equivalents", F::CashAndEquivalents),
  (S::Balance, "Total Debt", F::TotalDebt),
  (S::Balance, "Long-Term Debt", F::TotalDebt),
  (S::Balance, "Retained Earnings", F::RetainedEarnings),
  // Cash flow
  (S::Cashflow, "Operating Cash Flow", F::OperatingCashFlow),
  (S::Cashflow, "Cash from Operations", F::OperatingCashFlow),
  (S::Cashflow, "Net Cash from Operating Activities", F::OperatingCashFlow),
  (S::Cashflow, "Investing Cash Flow", F::InvestingCashFlow),
  (S::Cashflow, "Cash from Investing", F::InvestingCashFlow),
  (S::Cashflow, "Net Cash from Investing Activities", F::InvestingCashFlow),
  (S::Cashflow, "Financing Cash Flow", F::FinancingCashFlow),
  (S::Cashflow, "Cash from Financing", F::FinancingCashFlow),
  (S::Cashflow, "Net Cash from Financing Activities", F::FinancingCashFlow),
  (S::Cashflow, "Free Cash Flow", F::FreeCashFlow),
  (S::Cashflow, "Capital Expenditures", F::CapitalExpenditures),
  (S::Cashflow, "Capital Expenditure", F::CapitalExpenditures),
  (S::Cashflow, "Dividends Paid", F::DividendsPaid),
  (S::Cashflow, "Cash Dividends Paid", F::DividendsPaid),
  (S::Cashflow, "Net Change in Cash", F::NetChangeInCash),
  (S::Cashflow, "Change in Cash", F::NetChangeInCash),
  (S::Cashflow, "Changes In Cash", F::NetChangeInCash),
];

/// A configured provider alias, typically read from the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAlias {
  pub statement: StatementType,
  pub raw:       String,
  pub field:     CanonicalField,
}

/// Lookup from (statement, provider field name) to canonical field.
///
/// Names are matched case-insensitively with whitespace collapsed, so
/// `"Total  revenue "` and `"Total Revenue"` resolve identically.
#[derive(Debug, Clone)]
pub struct FieldMap {
  version: u32,
  entries: HashMap<(StatementType, String), CanonicalField>,
}

impl FieldMap {
  /// The built-in table at [`VOCABULARY_VERSION`].
  pub fn builtin() -> Self {
    let entries = BUILTIN_ALIASES
      .iter()
      .map(|(statement, raw, field)| ((*statement, lookup_key(raw)), *field))
      .collect();
    Self { version: VOCABULARY_VERSION, entries }
  }

  /// The built-in table extended with `aliases`. A configured alias overrides
  /// a built-in one with the same name.
  pub fn with_aliases<'a>(
    aliases: impl IntoIterator<Item = &'a FieldAlias>,
  ) -> Result<Self> {
    let mut map = Self::builtin();
    for alias in aliases {
      map.insert(alias.statement, &alias.raw, alias.field)?;
    }
    Ok(map)
  }

  /// Add one alias. The canonical field must belong to `statement`.
  pub fn insert(
    &mut self,
    statement: StatementType,
    raw: &str,
    field: CanonicalField,
  ) -> Result<()> {
    if field.statement() != statement {
      return Err(Error::Configuration(format!(
        "alias {raw:?} maps a {statement} row to {field}, which belongs to the {} statement",
        field.statement()
      )));
    }
    let key = lookup_key(raw);
    if key.is_empty() {
      return Err(Error::Configuration("empty field alias".into()));
    }
    self.entries.insert((statement, key), field);
    Ok(())
  }

  pub fn resolve(
    &self,
    statement: StatementType,
    raw: &str,
  ) -> Option<CanonicalField> {
    self.entries.get(&(statement, lookup_key(raw))).copied()
  }

  pub fn version(&self) -> u32 { self.version }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Default for FieldMap {
  fn default() -> Self { Self::builtin() }
}

fn lookup_key(raw: &str) -> String {
  raw
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_builtin_alias_targets_its_own_statement() {
    for (statement, raw, field) in BUILTIN_ALIASES {
      assert_eq!(
        field.statement(),
        *statement,
        "{raw:?} is filed under the wrong statement"
      );
    }
  }

  #[test]
  fn resolve_ignores_case_and_spacing() {
    let map = FieldMap::builtin();
    assert_eq!(
      map.resolve(StatementType::Income, "  total   REVENUE "),
      Some(CanonicalField::TotalRevenue)
    );
    assert_eq!(
      map.resolve(StatementType::Balance, "Shareholders' Equity"),
      Some(CanonicalField::TotalEquity)
    );
  }

  #[test]
  fn resolve_is_scoped_by_statement() {
    let map = FieldMap::builtin();
    assert_eq!(map.resolve(StatementType::Balance, "Net Income"), None);
    assert_eq!(map.resolve(StatementType::Income, "Mystery Line"), None);
  }

  #[test]
  fn configured_alias_extends_the_table() {
    let alias = FieldAlias {
      statement: StatementType::Income,
      raw:       "Revenues, net".into(),
      field:     CanonicalField::TotalRevenue,
    };
    let map = FieldMap::with_aliases([&alias]).unwrap();
    assert_eq!(
      map.resolve(StatementType::Income, "revenues, net"),
      Some(CanonicalField::TotalRevenue)
    );
    assert_eq!(map.version(), VOCABULARY_VERSION);
  }

  #[test]
  fn alias_across_statements_is_rejected() {
    let mut map = FieldMap::builtin();
    let err = map
      .insert(StatementType::Income, "Assets", CanonicalField::TotalAssets)
      .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
  }

  #[test]
  fn field_names_round_trip_through_strings() {
    for field in CanonicalField::iter() {
      assert_eq!(CanonicalField::parse(field.as_ref()).unwrap(), field);
    }
    assert_eq!(CanonicalField::TotalRevenue.to_string(), "total_revenue");
    assert_eq!(
      CanonicalField::of_statement(StatementType::Balance).len(),
      8
    );
  }

  #[test]
  fn statement_parses_provider_spellings() {
    assert_eq!(StatementType::parse("balance-sheet").unwrap(), StatementType::Balance);
    assert_eq!(StatementType::parse("Cash-Flow").unwrap(), StatementType::Cashflow);
    assert_eq!(StatementType::parse("income").unwrap(), StatementType::Income);
    assert!(StatementType::parse("equity").is_err());
  }
}
