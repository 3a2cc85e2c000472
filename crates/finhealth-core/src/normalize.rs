//! Silver normalizer: raw statement rows → canonical facts.
//!
//! Two kinds of trouble are recoverable and only counted:
//!
//! - an unmapped provider field is dropped ([`Issue::UnmappedField`]);
//! - an unparseable value becomes a null fact ([`Issue::Unparseable`]).
//!
//! When several provider fields resolve to the same canonical field for a
//! period, the one seen last in input order wins.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
  company::FiscalPeriod,
  fact::NormalizedFact,
  statement::RawStatementRow,
  vocab::{CanonicalField, FieldMap, StatementType},
};

/// A recoverable problem found while normalizing.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
  UnmappedField {
    period:    FiscalPeriod,
    statement: StatementType,
    name:      String,
  },
  Unparseable {
    period: FiscalPeriod,
    field:  CanonicalField,
    raw:    String,
  },
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
  /// One fact per (period, field), ordered by that key.
  pub facts:       Vec<NormalizedFact>,
  pub issues:      Vec<Issue>,
  /// How many facts were replaced by a later row for the same key.
  pub overwritten: usize,
}

impl Normalized {
  pub fn unmapped(&self) -> usize {
    self
      .issues
      .iter()
      .filter(|i| matches!(i, Issue::UnmappedField { .. }))
      .count()
  }

  pub fn unparseable(&self) -> usize {
    self
      .issues
      .iter()
      .filter(|i| matches!(i, Issue::Unparseable { .. }))
      .count()
  }
}

/// Normalize `rows` against `map`.
///
/// Pure and deterministic: the same rows always produce the same facts in the
/// same order.
pub fn normalize(map: &FieldMap, rows: &[RawStatementRow]) -> Normalized {
  let mut resolved: BTreeMap<(FiscalPeriod, CanonicalField), Option<f64>> =
    BTreeMap::new();
  let mut issues = Vec::new();
  let mut overwritten = 0;

  for row in rows {
    let Some(field) = map.resolve(row.statement, &row.field_name_raw) else {
      debug!(
        ticker = %row.period.ticker,
        statement = %row.statement,
        field = %row.field_name_raw,
        "unmapped provider field"
      );
      issues.push(Issue::UnmappedField {
        period:    row.period.clone(),
        statement: row.statement,
        name:      row.field_name_raw.clone(),
      });
      continue;
    };

    let value = match row.value.as_deref().map(coerce) {
      None | Some(Coerced::Null) => None,
      Some(Coerced::Value(v)) => Some(v),
      Some(Coerced::Invalid) => {
        let raw = row.value.clone().unwrap_or_default();
        debug!(ticker = %row.period.ticker, %field, %raw, "unparseable value");
        issues.push(Issue::Unparseable {
          period: row.period.clone(),
          field,
          raw,
        });
        None
      }
    };

    if resolved.insert((row.period.clone(), field), value).is_some() {
      overwritten += 1;
    }
  }

  let facts = resolved
    .into_iter()
    .map(|((period, field), value)| NormalizedFact { period, field, value })
    .collect();

  Normalized { facts, issues, overwritten }
}

// ─── Coercion ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Coerced {
  Value(f64),
  /// An explicit "no value" marker.
  Null,
  Invalid,
}

const PLACEHOLDERS: &[&str] = &["", "-", "—", "–", "n/a", "na", "nan", "none", "null"];

/// Interpret a provider cell as a number.
///
/// Accepts thousands separators, a leading `$`, and accounting negatives
/// written in parentheses. Non-finite results are invalid.
pub(crate) fn coerce(raw: &str) -> Coerced {
  let trimmed = raw.trim();
  if PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
    return Coerced::Null;
  }

  let (negated, body) = match trimmed
    .strip_prefix('(')
    .and_then(|s| s.strip_suffix(')'))
  {
    Some(inner) => (true, inner.trim()),
    None => (false, trimmed),
  };

  let (sign, body) = match body.strip_prefix('-') {
    Some(rest) => (-1.0, rest),
    None => (1.0, body),
  };
  let body = body.strip_prefix('$').unwrap_or(body);
  let cleaned: String = body.chars().filter(|c| *c != ',').collect();

  match cleaned.parse::<f64>() {
    Ok(v) if v.is_finite() => {
      let v = sign * v;
      Coerced::Value(if negated { -v } else { v })
    }
    _ => Coerced::Invalid,
  }
}
