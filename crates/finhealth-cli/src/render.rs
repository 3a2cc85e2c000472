//! Plain-text reports for the terminal.

use std::fmt::Write as _;

use finhealth_core::{
  company::Company,
  notes,
  pipeline::ScoreFailure,
  report::rank_scores,
  score::HealthScore,
  store::RunRecord,
};

const BAR_WIDTH: usize = 20;

fn company_name<'a>(companies: &'a [Company], ticker: &str) -> &'a str {
  companies
    .iter()
    .find(|c| c.ticker == ticker)
    .map_or("", |c| c.name.as_str())
}

/// A fixed-width bar for a score in [0, 100].
fn bar(score: f64) -> String {
  let filled = ((score.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
  format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// The ranking table, best first, followed by the healthy count and the
/// average composite. Companies that could not be scored are listed last.
pub fn ranking(
  scores: &[HealthScore],
  failures: &[ScoreFailure],
  companies: &[Company],
  healthy_threshold: f64,
) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:>4}  {:<6}  {:<28}  {:>6}  {:<10}  {}",
    "RANK", "TICKER", "COMPANY", "SCORE", "RATING", "HEALTHY"
  );

  for (rank, score) in rank_scores(scores) {
    let healthy = if score.composite >= healthy_threshold { "yes" } else { "no" };
    let _ = writeln!(
      out,
      "{:>4}  {:<6}  {:<28}  {:>6.1}  {:<10}  {}",
      rank,
      score.ticker(),
      company_name(companies, score.ticker()),
      score.composite,
      score.rating.to_string(),
      healthy
    );
  }
  for failure in failures {
    let _ = writeln!(
      out,
      "{:>4}  {:<6}  {:<28}  {:>6}  {:<10}  {}",
      "-",
      failure.ticker,
      company_name(companies, &failure.ticker),
      "-",
      "UNSCORED",
      failure.reason
    );
  }

  let healthy = scores
    .iter()
    .filter(|s| s.composite >= healthy_threshold)
    .count();
  let _ = writeln!(out);
  let _ = writeln!(
    out,
    "healthy: {healthy} of {} (threshold {healthy_threshold:.1})",
    scores.len()
  );
  if !scores.is_empty() {
    let average = scores.iter().map(|s| s.composite).sum::<f64>() / scores.len() as f64;
    let _ = writeln!(out, "average score: {average:.1}");
  }
  out
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// One company's score with a bar per category and the analysis notes.
pub fn detail(score: &HealthScore, companies: &[Company]) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{}  {}",
    score.ticker(),
    company_name(companies, score.ticker())
  );
  let _ = writeln!(
    out,
    "period: {} ({})",
    score.period.end_date.format("%Y-%m-%d"),
    score.period.period_type
  );
  let _ = writeln!(out, "composite: {:.1}  {}", score.composite, score.rating);
  let _ = writeln!(out);

  for (category, sub_score) in &score.sub_scores {
    let _ = writeln!(
      out,
      "{:<16}  {}  {:>5.1}",
      category.title(),
      bar(*sub_score),
      sub_score
    );
  }

  let _ = writeln!(out);
  let _ = writeln!(out, "notes:");
  if score.notes.is_empty() {
    let _ = writeln!(out, "  {}", notes::NO_CONCERNS);
  }
  for note in &score.notes {
    let _ = writeln!(out, "  - {note}");
  }

  let _ = writeln!(out);
  let _ = writeln!(out, "recommendation: {}", score.rating.recommendation());
  out
}

// ─── Runs ────────────────────────────────────────────────────────────────────

pub fn runs(records: &[RunRecord]) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<36}  {:<20}  {:>6}  {:>6}  {:<12}",
    "RUN", "STARTED", "SCORED", "FAILED", "GOLD DIGEST"
  );
  for r in records {
    let _ = writeln!(
      out,
      "{:<36}  {:<20}  {:>6}  {:>6}  {:<12}",
      r.run_id,
      r.started_at.format("%Y-%m-%d %H:%M:%S"),
      r.stats.scored,
      r.stats.failed,
      r.digests.gold.get(..12).unwrap_or(&r.digests.gold)
    );
  }
  out
}
