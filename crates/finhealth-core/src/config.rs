//! Scoring configuration: band tables, category weights, and rating bands.
//!
//! Configuration is data. The defaults reproduce the reference thresholds for
//! large technology companies; every number can be overridden from the
//! settings file. A configuration must pass [`ScoringConfig::validate`] before
//! any company is scored.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  kpi::KpiName,
  score::{Category, Rating},
  vocab::VOCABULARY_VERSION,
};

/// Tolerance when checking that category weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

// ─── Bands ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  HigherIsBetter,
  LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
  pub threshold: f64,
  pub score:     f64,
}

/// Ordered threshold bands for one KPI.
///
/// For [`Direction::HigherIsBetter`] thresholds run from best (highest) down
/// and a value scores the first band it reaches (`value >= threshold`). For
/// [`Direction::LowerIsBetter`] they run from best (lowest) up and a value
/// scores the first band it stays within (`value <= threshold`). Values past
/// the last threshold score `floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
  pub direction: Direction,
  pub bands:     Vec<Band>,
  pub floor:     f64,
}

impl BandTable {
  /// The four-step table used throughout the defaults: 100/75/50/25, floor 10.
  pub fn stepped(direction: Direction, thresholds: [f64; 4]) -> Self {
    let bands = thresholds
      .into_iter()
      .zip([100.0, 75.0, 50.0, 25.0])
      .map(|(threshold, score)| Band { threshold, score })
      .collect();
    Self { direction, bands, floor: 10.0 }
  }

  pub fn score(&self, value: f64) -> f64 {
    self
      .bands
      .iter()
      .find(|band| match self.direction {
        Direction::HigherIsBetter => value >= band.threshold,
        Direction::LowerIsBetter => value <= band.threshold,
      })
      .map_or(self.floor, |band| band.score)
  }

  fn validate(&self, kpi: KpiName) -> Result<()> {
    if self.bands.is_empty() {
      return Err(config_error(format!("band table for {kpi} has no bands")));
    }
    check_score(&format!("floor score for {kpi}"), self.floor)?;
    for band in &self.bands {
      if !band.threshold.is_finite() {
        return Err(config_error(format!("band threshold for {kpi} is not finite")));
      }
      check_score(&format!("band score for {kpi}"), band.score)?;
    }
    let ordered = self.bands.windows(2).all(|w| match self.direction {
      Direction::HigherIsBetter => w[0].threshold > w[1].threshold,
      Direction::LowerIsBetter => w[0].threshold < w[1].threshold,
    });
    if !ordered {
      return Err(config_error(format!(
        "band thresholds for {kpi} are not strictly ordered from best to worst"
      )));
    }
    Ok(())
  }
}

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
  pub category: Category,
  pub weight:   f64,
  /// The category sub-score is the mean of these KPIs' sub-scores.
  pub kpis:     Vec<KpiName>,
}

/// What to do with a KPI whose value is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataPolicy {
  /// Score the KPI at `neutral_score`: absent data is average, not failing.
  #[default]
  NeutralMidpoint,
  /// Leave the KPI out and spread its category's weight over the categories
  /// that do have data.
  Renormalize,
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

/// A rating applies from `min` (inclusive) up to the next band's `min`
/// (exclusive); the top band runs to 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
  pub rating: Rating,
  pub min:    f64,
}

// ─── ScoringConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  /// Vocabulary version this configuration was written against.
  pub version:           u32,
  pub neutral_score:     f64,
  pub missing_data:      MissingDataPolicy,
  /// Composite at or above which a company counts as healthy.
  pub healthy_threshold: f64,
  pub categories:        Vec<CategoryConfig>,
  pub bands:             BTreeMap<KpiName, BandTable>,
  /// Ascending by `min`.
  pub ratings:           Vec<RatingBand>,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    use Direction::{HigherIsBetter, LowerIsBetter};

    let categories = vec![
      CategoryConfig {
        category: Category::Liquidity,
        weight:   0.25,
        kpis:     vec![KpiName::CurrentRatio],
      },
      CategoryConfig {
        category: Category::Leverage,
        weight:   0.25,
        kpis:     vec![KpiName::DebtToEquity],
      },
      CategoryConfig {
        category: Category::Profitability,
        weight:   0.20,
        kpis:     vec![KpiName::NetMargin],
      },
      CategoryConfig {
        category: Category::Returns,
        weight:   0.15,
        kpis:     vec![KpiName::Roe],
      },
      CategoryConfig {
        category: Category::CashGeneration,
        weight:   0.15,
        kpis:     vec![KpiName::FreeCashFlowMargin],
      },
    ];

    let bands = BTreeMap::from([
      (KpiName::CurrentRatio, BandTable::stepped(HigherIsBetter, [2.0, 1.5, 1.0, 0.5])),
      (KpiName::CashRatio, BandTable::stepped(HigherIsBetter, [0.5, 0.3, 0.15, 0.05])),
      (KpiName::GrossMargin, BandTable::stepped(HigherIsBetter, [0.50, 0.35, 0.20, 0.10])),
      (KpiName::OperatingMargin, BandTable::stepped(HigherIsBetter, [0.25, 0.15, 0.08, 0.0])),
      (KpiName::NetMargin, BandTable::stepped(HigherIsBetter, [0.20, 0.10, 0.05, 0.0])),
      (KpiName::Roe, BandTable::stepped(HigherIsBetter, [0.20, 0.15, 0.10, 0.05])),
      (KpiName::Roa, BandTable::stepped(HigherIsBetter, [0.15, 0.10, 0.05, 0.02])),
      (KpiName::DebtToEquity, BandTable::stepped(LowerIsBetter, [0.5, 1.0, 2.0, 3.0])),
      (KpiName::DebtToAssets, BandTable::stepped(LowerIsBetter, [0.3, 0.5, 0.6, 0.7])),
      (
        KpiName::OperatingCashFlowRatio,
        BandTable::stepped(HigherIsBetter, [1.0, 0.6, 0.3, 0.1]),
      ),
      (
        KpiName::FreeCashFlowMargin,
        BandTable::stepped(HigherIsBetter, [0.15, 0.10, 0.05, 0.0]),
      ),
      (KpiName::RevenueGrowth, BandTable::stepped(HigherIsBetter, [0.20, 0.10, 0.0, -0.10])),
      (KpiName::ProfitGrowth, BandTable::stepped(HigherIsBetter, [0.15, 0.0, -0.10, -0.25])),
    ]);

    let ratings = vec![
      RatingBand { rating: Rating::Critical, min: 0.0 },
      RatingBand { rating: Rating::Concerning, min: 35.0 },
      RatingBand { rating: Rating::Fair, min: 50.0 },
      RatingBand { rating: Rating::Good, min: 65.0 },
      RatingBand { rating: Rating::Excellent, min: 80.0 },
    ];

    Self {
      version: VOCABULARY_VERSION,
      neutral_score: 50.0,
      missing_data: MissingDataPolicy::default(),
      healthy_threshold: 50.0,
      categories,
      bands,
      ratings,
    }
  }
}

impl ScoringConfig {
  /// Check every structural invariant. Any failure is a
  /// [`Error::Configuration`] and must stop the pipeline before it scores
  /// anything.
  pub fn validate(&self) -> Result<()> {
    if self.version != VOCABULARY_VERSION {
      return Err(config_error(format!(
        "scoring configuration targets vocabulary v{}, this build uses v{VOCABULARY_VERSION}",
        self.version
      )));
    }
    check_score("neutral score", self.neutral_score)?;
    check_score("healthy threshold", self.healthy_threshold)?;
    self.validate_categories()?;
    for (kpi, table) in &self.bands {
      table.validate(*kpi)?;
    }
    self.validate_ratings()
  }

  fn validate_categories(&self) -> Result<()> {
    if self.categories.is_empty() {
      return Err(config_error("no scoring categories"));
    }

    let mut seen = BTreeSet::new();
    let mut total = 0.0;
    for entry in &self.categories {
      if !seen.insert(entry.category) {
        return Err(config_error(format!("category {} listed twice", entry.category)));
      }
      if !entry.weight.is_finite() || entry.weight < 0.0 {
        return Err(config_error(format!(
          "category {} has invalid weight {}",
          entry.category, entry.weight
        )));
      }
      if entry.kpis.is_empty() {
        return Err(config_error(format!("category {} scores no kpis", entry.category)));
      }
      for kpi in &entry.kpis {
        if !self.bands.contains_key(kpi) {
          return Err(config_error(format!(
            "category {} scores {kpi}, which has no band table",
            entry.category
          )));
        }
      }
      total += entry.weight;
    }

    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(config_error(format!("category weights sum to {total}, not 1.0")));
    }
    Ok(())
  }

  fn validate_ratings(&self) -> Result<()> {
    let Some(first) = self.ratings.first() else {
      return Err(config_error("no rating bands"));
    };
    if first.min != 0.0 {
      return Err(config_error(format!(
        "rating bands start at {} instead of 0, leaving a gap",
        first.min
      )));
    }

    let mut seen = BTreeSet::new();
    for band in &self.ratings {
      if !seen.insert(band.rating) {
        return Err(config_error(format!("rating {} has two bands", band.rating)));
      }
      if !(0.0..100.0).contains(&band.min) {
        return Err(config_error(format!(
          "rating band {} starts at {}, outside [0, 100)",
          band.rating, band.min
        )));
      }
    }
    if !self.ratings.windows(2).all(|w| w[0].min < w[1].min) {
      return Err(config_error("rating bands overlap or are not ascending"));
    }
    Ok(())
  }
}

fn check_score(what: &str, value: f64) -> Result<()> {
  if !(0.0..=100.0).contains(&value) {
    return Err(config_error(format!("{what} {value} is outside [0, 100]")));
  }
  Ok(())
}

fn config_error(msg: impl Into<String>) -> Error { Error::Configuration(msg.into()) }

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_config_error(config: &ScoringConfig) {
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));
  }

  #[test]
  fn defaults_are_valid() {
    ScoringConfig::default().validate().unwrap();
  }

  #[test]
  fn stepped_bands_higher_is_better() {
    let table = BandTable::stepped(Direction::HigherIsBetter, [2.0, 1.5, 1.0, 0.5]);
    assert_eq!(table.score(2.5), 100.0);
    assert_eq!(table.score(2.0), 100.0);
    assert_eq!(table.score(1.7), 75.0);
    assert_eq!(table.score(1.0), 50.0);
    assert_eq!(table.score(0.5), 25.0);
    assert_eq!(table.score(0.1), 10.0);
  }

  #[test]
  fn stepped_bands_lower_is_better() {
    let table = BandTable::stepped(Direction::LowerIsBetter, [0.5, 1.0, 2.0, 3.0]);
    assert_eq!(table.score(0.2), 100.0);
    assert_eq!(table.score(1.0), 75.0);
    assert_eq!(table.score(2.0), 50.0);
    assert_eq!(table.score(2.5), 25.0);
    assert_eq!(table.score(8.0), 10.0);
  }

  #[test]
  fn weights_must_sum_to_one() {
    let mut config = ScoringConfig::default();
    config.categories[0].weight = 0.30;
    assert_config_error(&config);

    config.categories[0].weight = 0.25 + 1e-9;
    config.validate().unwrap();
  }

  #[test]
  fn negative_weight_is_rejected() {
    let mut config = ScoringConfig::default();
    config.categories[0].weight = -0.25;
    config.categories[1].weight = 0.75;
    assert_config_error(&config);
  }

  #[test]
  fn band_scores_must_lie_within_range() {
    let mut config = ScoringConfig::default();
    config.bands.get_mut(&KpiName::CurrentRatio).unwrap().bands[0].score = 120.0;
    assert_config_error(&config);

    let mut config = ScoringConfig::default();
    config.bands.get_mut(&KpiName::Roe).unwrap().floor = -1.0;
    assert_config_error(&config);
  }

  #[test]
  fn band_thresholds_must_be_ordered() {
    let mut config = ScoringConfig::default();
    config.bands.get_mut(&KpiName::DebtToEquity).unwrap().bands.reverse();
    assert_config_error(&config);
  }

  #[test]
  fn scored_kpi_needs_a_band_table() {
    let mut config = ScoringConfig::default();
    config.bands.remove(&KpiName::NetMargin);
    assert_config_error(&config);
  }

  #[test]
  fn rating_bands_must_cover_from_zero() {
    let mut config = ScoringConfig::default();
    config.ratings.remove(0);
    assert_config_error(&config);
  }

  #[test]
  fn rating_bands_must_ascend() {
    let mut config = ScoringConfig::default();
    config.ratings.swap(2, 3);
    assert_config_error(&config);

    let mut config = ScoringConfig::default();
    config.ratings[4].min = 100.0;
    assert_config_error(&config);
  }

  #[test]
  fn vocabulary_version_must_match() {
    let config = ScoringConfig { version: VOCABULARY_VERSION + 1, ..Default::default() };
    assert_config_error(&config);
  }

  #[test]
  fn deserializes_partial_overrides() {
    let json = serde_json::json!({
      "neutral_score": 40.0,
      "missing_data": "renormalize",
      "bands": {
        "current_ratio": {
          "direction": "higher_is_better",
          "bands": [{ "threshold": 3.0, "score": 100.0 }],
          "floor": 0.0
        }
      }
    });
    let config: ScoringConfig = serde_json::from_value(json).unwrap();
    assert_eq!(config.neutral_score, 40.0);
    assert_eq!(config.missing_data, MissingDataPolicy::Renormalize);
    assert_eq!(config.categories.len(), 5);
    assert_eq!(config.bands.len(), 1);
    // Categories still reference KPIs whose tables were replaced away.
    assert_config_error(&config);
  }
}
