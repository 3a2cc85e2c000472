//! Bronze layer: raw statement rows exactly as the provider delivered them.

use serde::{Deserialize, Serialize};

use crate::{company::FiscalPeriod, vocab::StatementType};

/// One provider line item for one period.
///
/// `value` keeps the provider's text; numeric coercion is the normalizer's
/// job so that a malformed cell becomes a null fact instead of a failed load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatementRow {
  pub period:         FiscalPeriod,
  pub statement:      StatementType,
  pub field_name_raw: String,
  pub value:          Option<String>,
}

impl RawStatementRow {
  pub fn new(
    period: FiscalPeriod,
    statement: StatementType,
    field_name_raw: impl Into<String>,
    value: Option<&str>,
  ) -> Self {
    Self {
      period,
      statement,
      field_name_raw: field_name_raw.into(),
      value: value.map(str::to_owned),
    }
  }

  pub fn ticker(&self) -> &str { &self.period.ticker }
}
