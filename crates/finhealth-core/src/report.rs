//! Report assembler: persisted layers → a workbook of wide-form sheets.
//!
//! Apart from ranks, every cell is copied from a fact, KPI, or score that
//! already exists; absent values become [`Cell::Empty`].

use std::{cmp::Ordering, collections::BTreeMap};

use strum::IntoEnumIterator;

use crate::{
  company::{Company, FiscalPeriod},
  fact::{NormalizedFact, StatementTable},
  kpi::{Kpi, KpiName},
  notes,
  pipeline::{RunOutput, ScoreFailure},
  score::{Category, HealthScore},
  vocab::CanonicalField,
};

// ─── Cells and sheets ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
  Empty,
  Text(String),
  Number(f64),
  Integer(i64),
  Bool(bool),
}

impl Cell {
  pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }

  pub fn number(value: Option<f64>) -> Self { value.map_or(Self::Empty, Self::Number) }

  /// Plain-text form used by the CSV writer.
  pub fn render(&self) -> String {
    match self {
      Self::Empty => String::new(),
      Self::Text(s) => s.clone(),
      Self::Number(n) => n.to_string(),
      Self::Integer(i) => i.to_string(),
      Self::Bool(b) => b.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
  pub name:    String,
  pub headers: Vec<String>,
  pub rows:    Vec<Vec<Cell>>,
}

impl Sheet {
  pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
    Self { name: name.into(), headers, rows: Vec::new() }
  }

  /// File-name form of the sheet name: `"Income Statement"` → `income_statement`.
  pub fn slug(&self) -> String {
    self
      .name
      .split_whitespace()
      .map(str::to_lowercase)
      .collect::<Vec<_>>()
      .join("_")
  }

  /// The values of one column, by header.
  pub fn column(&self, header: &str) -> Option<Vec<&Cell>> {
    let idx = self.headers.iter().position(|h| h == header)?;
    Some(self.rows.iter().map(|row| &row[idx]).collect())
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
  pub sheets: Vec<Sheet>,
}

impl Workbook {
  pub fn sheet(&self, name: &str) -> Option<&Sheet> {
    self.sheets.iter().find(|s| s.name == name)
  }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Borrowed view of every layer the workbook draws on.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
  pub companies: &'a [Company],
  pub facts:     &'a [NormalizedFact],
  pub kpis:      &'a [Kpi],
  pub scores:    &'a [HealthScore],
  pub failures:  &'a [ScoreFailure],
}

impl<'a> From<&'a RunOutput> for Layers<'a> {
  fn from(out: &'a RunOutput) -> Self {
    Self {
      companies: &out.companies,
      facts:     &out.facts,
      kpis:      &out.kpis,
      scores:    &out.scores,
      failures:  &out.failures,
    }
  }
}

/// Competition ranking by composite, best first: tied scores share a rank and
/// the next rank skips (1, 2, 2, 4). Ties are listed by ticker.
pub fn rank_scores(scores: &[HealthScore]) -> Vec<(usize, &HealthScore)> {
  let mut sorted: Vec<&HealthScore> = scores.iter().collect();
  sorted.sort_by(|a, b| {
    b.composite
      .total_cmp(&a.composite)
      .then_with(|| a.ticker().cmp(b.ticker()))
  });

  let mut ranked = Vec::with_capacity(sorted.len());
  let mut rank = 0;
  let mut previous = None;
  for (i, score) in sorted.into_iter().enumerate() {
    if previous != Some(score.composite) {
      rank = i + 1;
      previous = Some(score.composite);
    }
    ranked.push((rank, score));
  }
  ranked
}

/// Build the workbook. `healthy_threshold` decides the healthy flag.
pub fn assemble(layers: Layers<'_>, healthy_threshold: f64) -> Workbook {
  let names: BTreeMap<&str, &str> = layers
    .companies
    .iter()
    .map(|c| (c.ticker.as_str(), c.name.as_str()))
    .collect();

  let mut sheets = vec![companies_sheet(layers.companies)];
  sheets.extend(StatementTable::all(layers.facts).iter().map(statement_sheet));
  sheets.push(kpi_sheet(layers.kpis, layers.facts));
  sheets.push(scores_sheet(layers.scores, &names, healthy_threshold));
  sheets.push(failures_sheet(layers.failures));
  Workbook { sheets }
}

fn period_headers() -> Vec<String> {
  ["ticker", "period_end", "period_type"].map(str::to_owned).to_vec()
}

fn period_cells(period: &FiscalPeriod) -> Vec<Cell> {
  vec![
    Cell::text(&period.ticker),
    Cell::text(period.end_date.to_string()),
    Cell::text(period.period_type.to_string()),
  ]
}

fn companies_sheet(companies: &[Company]) -> Sheet {
  let mut sheet = Sheet::new("Companies", vec!["ticker".into(), "name".into()]);
  let mut sorted: Vec<&Company> = companies.iter().collect();
  sorted.sort_by(|a, b| a.ticker.cmp(&b.ticker));
  sheet.rows = sorted
    .into_iter()
    .map(|c| vec![Cell::text(&c.ticker), Cell::text(&c.name)])
    .collect();
  sheet
}

fn statement_sheet(table: &StatementTable) -> Sheet {
  let mut headers = period_headers();
  headers.extend(table.columns.iter().map(ToString::to_string));

  let mut sheet = Sheet::new(table.statement.title(), headers);
  sheet.rows = table
    .rows
    .iter()
    .map(|(period, facts)| {
      let mut row = period_cells(period);
      row.extend(table.columns.iter().map(|f| Cell::number(facts.get(*f))));
      row
    })
    .collect();
  sheet
}

/// Competition ranks, largest value first. Nulls share the rank after the
/// last value.
fn competition_ranks(values: &[Option<f64>]) -> Vec<usize> {
  let mut order: Vec<usize> = (0..values.len()).collect();
  order.sort_by(|&a, &b| match (values[a], values[b]) {
    (Some(x), Some(y)) => y.total_cmp(&x),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  });

  let mut ranks = vec![0; values.len()];
  let mut rank = 0;
  let mut previous = None;
  for (i, idx) in order.into_iter().enumerate() {
    if previous != Some(values[idx]) {
      rank = i + 1;
      previous = Some(values[idx]);
    }
    ranks[idx] = rank;
  }
  ranks
}

fn kpi_sheet(kpis: &[Kpi], facts: &[NormalizedFact]) -> Sheet {
  let mut headers = period_headers();
  headers.extend(KpiName::iter().map(|k| k.to_string()));
  headers.extend(["revenue_rank".to_owned(), "profit_rank".to_owned()]);

  let mut by_period: BTreeMap<&FiscalPeriod, BTreeMap<KpiName, Option<f64>>> =
    BTreeMap::new();
  for kpi in kpis {
    by_period.entry(&kpi.period).or_default().insert(kpi.name, kpi.value);
  }

  let mut size: BTreeMap<&FiscalPeriod, (Option<f64>, Option<f64>)> = BTreeMap::new();
  for fact in facts {
    let entry = size.entry(&fact.period).or_default();
    match fact.field {
      CanonicalField::TotalRevenue => entry.0 = fact.value,
      CanonicalField::NetIncome => entry.1 = fact.value,
      _ => {}
    }
  }

  // Companies are ranked against each other within one fiscal period.
  let periods: Vec<&FiscalPeriod> = by_period.keys().copied().collect();
  let mut peers: BTreeMap<_, Vec<usize>> = BTreeMap::new();
  for (i, period) in periods.iter().enumerate() {
    peers.entry((period.end_date, period.period_type)).or_default().push(i);
  }
  let mut ranks = vec![(0, 0); periods.len()];
  for members in peers.values() {
    let (revenue, profit): (Vec<_>, Vec<_>) = members
      .iter()
      .map(|&i| size.get(periods[i]).copied().unwrap_or_default())
      .unzip();
    let revenue_ranks = competition_ranks(&revenue);
    let profit_ranks = competition_ranks(&profit);
    for (j, &i) in members.iter().enumerate() {
      ranks[i] = (revenue_ranks[j], profit_ranks[j]);
    }
  }

  let mut sheet = Sheet::new("KPIs", headers);
  sheet.rows = by_period
    .into_iter()
    .zip(ranks)
    .map(|((period, values), (revenue_rank, profit_rank))| {
      let mut row = period_cells(period);
      row.extend(
        KpiName::iter().map(|k| Cell::number(values.get(&k).copied().flatten())),
      );
      row.push(Cell::Integer(revenue_rank as i64));
      row.push(Cell::Integer(profit_rank as i64));
      row
    })
    .collect();
  sheet
}

fn scores_sheet(
  scores: &[HealthScore],
  names: &BTreeMap<&str, &str>,
  healthy_threshold: f64,
) -> Sheet {
  let mut headers: Vec<String> = [
    "ticker",
    "company",
    "period_end",
    "period_type",
    "composite",
    "rating",
    "health_rank",
    "healthy",
  ]
  .map(str::to_owned)
  .to_vec();
  headers.extend(Category::iter().map(|c| c.to_string()));
  headers.push("notes".into());

  let mut sheet = Sheet::new("Health Scores", headers);
  sheet.rows = rank_scores(scores)
    .into_iter()
    .map(|(rank, score)| {
      let mut row = vec![
        Cell::text(score.ticker()),
        Cell::text(names.get(score.ticker()).copied().unwrap_or(score.ticker())),
        Cell::text(score.period.end_date.to_string()),
        Cell::text(score.period.period_type.to_string()),
        Cell::Number(score.composite),
        Cell::text(score.rating.to_string()),
        Cell::Integer(rank as i64),
        Cell::Bool(score.composite >= healthy_threshold),
      ];
      row.extend(
        Category::iter().map(|c| Cell::number(score.sub_scores.get(&c).copied())),
      );
      row.push(Cell::text(notes::summarize(&score.notes)));
      row
    })
    .collect();
  sheet
}

fn failures_sheet(failures: &[ScoreFailure]) -> Sheet {
  let mut sheet = Sheet::new("Score Failures", vec!["ticker".into(), "reason".into()]);
  sheet.rows = failures
    .iter()
    .map(|f| vec![Cell::text(&f.ticker), Cell::text(&f.reason)])
    .collect();
  sheet
}
