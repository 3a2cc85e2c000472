//! Snapshot digests for pipeline layers.
//!
//! A digest is a SHA-256 hash over the JSON encoding of every record in a
//! layer, sorted first so that record order never changes the result.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

/// One digest per layer written by a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDigests {
  pub bronze: String,
  pub silver: String,
  pub gold:   String,
  pub scores: String,
}

/// Digest a layer snapshot.
///
/// Stable: the same records in any order → the same digest.
pub fn digest_records<T: Serialize>(records: &[T]) -> Result<String> {
  let mut encoded = records
    .iter()
    .map(serde_json::to_vec)
    .collect::<Result<Vec<_>, _>>()?;
  encoded.sort();

  let mut hasher = Sha256::new();
  for record in &encoded {
    hasher.update((record.len() as u64).to_le_bytes());
    hasher.update(record);
  }
  Ok(hex::encode(hasher.finalize()))
}
