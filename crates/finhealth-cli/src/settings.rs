//! Runtime settings, layered from an optional TOML file and `FINHEALTH_*`
//! environment variables.
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration over the built-in ten-company universe.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use finhealth_core::{
  company::{Company, default_universe},
  config::ScoringConfig,
  vocab::{FieldAlias, FieldMap},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite file holding every layer. A leading `~/` is expanded.
  pub store_path: PathBuf,
  pub universe:   Vec<Company>,
  /// Provider field names added to the built-in vocabulary.
  pub aliases:    Vec<FieldAlias>,
  pub scoring:    ScoringConfig,
  pub retry:      RetryPolicy,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("finhealth.db"),
      universe:   default_universe(),
      aliases:    Vec::new(),
      scoring:    ScoringConfig::default(),
      retry:      RetryPolicy::default(),
    }
  }
}

impl Settings {
  /// Read `path` (if it exists) and overlay the environment.
  ///
  /// Nested keys use a double underscore: `FINHEALTH_RETRY__ATTEMPTS=5`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("FINHEALTH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    raw
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  /// The built-in vocabulary extended with the configured aliases.
  pub fn field_map(&self) -> finhealth_core::Result<FieldMap> {
    FieldMap::with_aliases(&self.aliases)
  }
}

// ─── Retry policy ────────────────────────────────────────────────────────────

/// How store calls are retried. The delay doubles after every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub attempts:     u32,
  pub timeout_secs: u64,
  pub backoff_ms:   u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { attempts: 3, timeout_secs: 30, backoff_ms: 250 }
  }
}

impl RetryPolicy {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  pub fn backoff(&self) -> Duration { Duration::from_millis(self.backoff_ms) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
