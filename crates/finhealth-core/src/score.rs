//! Health scorer: a KPI set → composite score, rating, and notes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
  Error, Result,
  company::FiscalPeriod,
  config::{MissingDataPolicy, ScoringConfig},
  kpi::KpiSet,
  notes,
};

/// Scoring category. Each one rolls up one or more KPIs into a sub-score.
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
pub enum Category {
  Liquidity,
  Leverage,
  Profitability,
  Returns,
  CashGeneration,
}

impl Category {
  pub fn title(self) -> &'static str {
    match self {
      Self::Liquidity => "Liquidity",
      Self::Leverage => "Leverage",
      Self::Profitability => "Profitability",
      Self::Returns => "Returns",
      Self::CashGeneration => "Cash Generation",
    }
  }
}

/// Rating label, worst first.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Rating {
  Critical,
  Concerning,
  Fair,
  Good,
  Excellent,
}

impl Rating {
  pub fn parse(s: &str) -> Result<Self> {
    s.trim().parse().map_err(|_| Error::UnknownRating(s.to_owned()))
  }

  /// One-line recommendation closing a company report.
  pub fn recommendation(self) -> &'static str {
    match self {
      Self::Excellent => "Excellent financial health with solid fundamentals across the board.",
      Self::Good => "Financially healthy; some areas could improve.",
      Self::Fair => "Moderate financial health; keep an eye on the weaker metrics.",
      Self::Concerning => "Signs of financial stress; a deeper review is advised.",
      Self::Critical => "Critical financial position; high risk.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
  /// The period whose KPIs were scored.
  pub period:     FiscalPeriod,
  pub composite:  f64,
  pub rating:     Rating,
  pub sub_scores: BTreeMap<Category, f64>,
  pub notes:      Vec<String>,
}

impl HealthScore {
  pub fn ticker(&self) -> &str { &self.period.ticker }
}

/// A validated [`ScoringConfig`], ready to score companies.
///
/// Construction is the only place validation happens, so holding a `Scorer`
/// means the configuration is sound. It is never mutated and can be shared
/// across worker threads by reference.
#[derive(Debug, Clone)]
pub struct Scorer {
  config: ScoringConfig,
}

impl Scorer {
  pub fn new(config: ScoringConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &ScoringConfig { &self.config }

  /// Whether `score` clears the configured healthy threshold.
  pub fn is_healthy(&self, score: &HealthScore) -> bool {
    score.composite >= self.config.healthy_threshold
  }

  /// The rating band containing `composite`.
  pub fn rating(&self, composite: f64) -> Rating {
    self
      .config
      .ratings
      .iter()
      .rev()
      .find(|band| composite >= band.min)
      .or(self.config.ratings.first())
      .map_or(Rating::Critical, |band| band.rating)
  }

  /// Score one company's most recent KPI set.
  ///
  /// Fails with [`Error::InsufficientData`] only when `kpis` is empty, or,
  /// under [`MissingDataPolicy::Renormalize`], when no scored KPI has a
  /// value.
  pub fn score(&self, period: &FiscalPeriod, kpis: &KpiSet) -> Result<HealthScore> {
    if kpis.is_empty() {
      return Err(Error::InsufficientData(period.ticker.clone()));
    }

    let config = &self.config;
    let mut sub_scores = BTreeMap::new();
    let mut weighted = 0.0;
    let mut weight_used = 0.0;

    for entry in &config.categories {
      let mut scores = Vec::with_capacity(entry.kpis.len());
      for kpi in &entry.kpis {
        let table = config.bands.get(kpi).ok_or_else(|| {
          Error::Configuration(format!("no band table for {kpi}"))
        })?;
        match (kpis.get(kpi).copied().flatten(), config.missing_data) {
          (Some(value), _) => scores.push(table.score(value)),
          (None, MissingDataPolicy::NeutralMidpoint) => scores.push(config.neutral_score),
          (None, MissingDataPolicy::Renormalize) => {}
        }
      }
      if scores.is_empty() {
        continue;
      }

      let sub = scores.iter().sum::<f64>() / scores.len() as f64;
      sub_scores.insert(entry.category, sub);
      weighted += entry.weight * sub;
      weight_used += entry.weight;
    }

    let composite = match config.missing_data {
      MissingDataPolicy::NeutralMidpoint => weighted,
      MissingDataPolicy::Renormalize if weight_used > 0.0 => weighted / weight_used,
      MissingDataPolicy::Renormalize => {
        return Err(Error::InsufficientData(period.ticker.clone()));
      }
    }
    .clamp(0.0, 100.0);

    Ok(HealthScore {
      period: period.clone(),
      composite,
      rating: self.rating(composite),
      sub_scores,
      notes: notes::analyze(kpis),
    })
  }
}
