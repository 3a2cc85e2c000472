//! Error types for the finhealth-csv codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing column {0:?} in header")]
  MissingColumn(&'static str),

  #[error("line {line}: {reason}")]
  MalformedRow { line: u64, reason: String },

  #[error("line {line}: invalid date {value:?}")]
  InvalidDate { line: u64, value: String },

  #[error("line {line}: {source}")]
  Vocabulary {
    line:   u64,
    source: finhealth_core::Error,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
