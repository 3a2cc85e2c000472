//! Error types for `finhealth-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The KPI mapping for a company was empty (or, under the renormalizing
  /// policy, held no usable value). Surfaced per company; never aborts a batch.
  #[error("insufficient data to score {0}")]
  InsufficientData(String),

  /// The scoring configuration failed validation. Fatal for the whole run.
  #[error("invalid configuration: {0}")]
  Configuration(String),

  #[error("unknown canonical field: {0:?}")]
  UnknownField(String),

  #[error("unknown kpi: {0:?}")]
  UnknownKpi(String),

  #[error("unknown statement type: {0:?}")]
  UnknownStatement(String),

  #[error("unknown period type: {0:?}")]
  UnknownPeriodType(String),

  #[error("unknown rating: {0:?}")]
  UnknownRating(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
