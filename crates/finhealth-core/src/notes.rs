//! Analysis notes attached to each health score.
//!
//! Notes are plain observations on threshold crossings. They never affect the
//! composite.

use crate::kpi::{KpiName, KpiSet};

/// Written when no rule fires.
pub const NO_CONCERNS: &str = "No significant concerns identified.";

struct Rule {
  kpi:  KpiName,
  test: fn(f64) -> bool,
  note: &'static str,
}

const RULES: &[Rule] = &[
  Rule {
    kpi:  KpiName::CurrentRatio,
    test: |v| v < 1.0,
    note: "Low liquidity: current ratio below 1.0",
  },
  Rule {
    kpi:  KpiName::CurrentRatio,
    test: |v| v > 3.0,
    note: "High liquidity: current ratio above 3.0, may hold idle assets",
  },
  Rule {
    kpi:  KpiName::CashRatio,
    test: |v| v < 0.2,
    note: "Limited cash reserves: cash ratio below 0.2",
  },
  Rule {
    kpi:  KpiName::DebtToEquity,
    test: |v| v > 2.0,
    note: "High leverage: debt-to-equity above 2.0",
  },
  Rule {
    kpi:  KpiName::DebtToEquity,
    test: |v| v < 0.3,
    note: "Conservative debt levels",
  },
  Rule {
    kpi:  KpiName::DebtToAssets,
    test: |v| v > 0.6,
    note: "More than 60% of assets financed by liabilities",
  },
  Rule {
    kpi:  KpiName::NetMargin,
    test: |v| v < 0.0,
    note: "Company is not profitable",
  },
  Rule {
    kpi:  KpiName::NetMargin,
    test: |v| v > 0.20,
    note: "Excellent profit margins (above 20%)",
  },
  Rule {
    kpi:  KpiName::Roe,
    test: |v| v > 0.25,
    note: "Outstanding return on equity (above 25%)",
  },
  Rule {
    kpi:  KpiName::Roe,
    test: |v| v < 0.05,
    note: "Low return on equity (below 5%)",
  },
  Rule {
    kpi:  KpiName::FreeCashFlow,
    test: |v| v < 0.0,
    note: "Negative free cash flow",
  },
  Rule {
    kpi:  KpiName::FreeCashFlowMargin,
    test: |v| v > 0.15,
    note: "Strong free cash flow generation",
  },
  Rule {
    kpi:  KpiName::RevenueGrowth,
    test: |v| v < 0.0,
    note: "Revenue declined from the prior period",
  },
];

/// Every note whose rule fires for `kpis`, in rule order. Null KPIs fire
/// nothing.
pub fn analyze(kpis: &KpiSet) -> Vec<String> {
  RULES
    .iter()
    .filter(|rule| {
      kpis
        .get(&rule.kpi)
        .copied()
        .flatten()
        .is_some_and(rule.test)
    })
    .map(|rule| rule.note.to_owned())
    .collect()
}

/// Join notes for a single report cell.
pub fn summarize(notes: &[String]) -> String {
  if notes.is_empty() {
    NO_CONCERNS.to_owned()
  } else {
    notes.join("; ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fires_on_threshold_crossings() {
    let kpis: KpiSet = [
      (KpiName::CurrentRatio, Some(0.8)),
      (KpiName::DebtToEquity, Some(2.5)),
      (KpiName::FreeCashFlow, Some(-1.0e9)),
    ]
    .into_iter()
    .collect();
    let notes = analyze(&kpis);
    assert_eq!(notes, vec![
      "Low liquidity: current ratio below 1.0",
      "High leverage: debt-to-equity above 2.0",
      "Negative free cash flow",
    ]);
  }

  #[test]
  fn nulls_and_middling_values_are_quiet() {
    let kpis: KpiSet = [
      (KpiName::CurrentRatio, Some(1.5)),
      (KpiName::DebtToEquity, None),
      (KpiName::NetMargin, Some(0.10)),
    ]
    .into_iter()
    .collect();
    let notes = analyze(&kpis);
    assert!(notes.is_empty());
    assert_eq!(summarize(&notes), NO_CONCERNS);
  }

  #[test]
  fn summarize_joins_with_semicolons() {
    let notes = vec!["a".to_owned(), "b".to_owned()];
    assert_eq!(summarize(&notes), "a; b");
  }
}
