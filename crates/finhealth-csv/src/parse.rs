//! Provider CSV readers.
//!
//! Both layouts read every record independently: a malformed record yields an
//! `Err` in its position and the rest of the file still loads.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use finhealth_core::{
  company::{FiscalPeriod, PeriodType},
  statement::RawStatementRow,
  vocab::StatementType,
};
use tracing::debug;

use crate::{
  WideLayout,
  error::{Error, Result},
};

/// Columns of the long layout, in the order they are written.
pub const LONG_COLUMNS: [&str; 6] =
  ["ticker", "period_end", "period_type", "statement", "field", "value"];

fn reader(input: &str) -> csv::Reader<&[u8]> {
  ReaderBuilder::new()
    .trim(Trim::All)
    .flexible(true)
    .from_reader(input.as_bytes())
}

fn line_of(record: &StringRecord) -> u64 { record.position().map_or(0, |p| p.line()) }

/// Parse a period end: `YYYY-MM-DD`, a timestamp starting with one, or a bare
/// `YYYY` meaning December 31 of that year.
pub(crate) fn parse_period_end(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
    return NaiveDate::from_ymd_opt(s.parse().ok()?, 12, 31);
  }
  let date = match s.char_indices().nth(10) {
    Some((i, ' ' | 'T')) => &s[..i],
    _ => s,
  };
  NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn opt_value(s: &str) -> Option<&str> { (!s.is_empty()).then_some(s) }

// ─── Long layout ─────────────────────────────────────────────────────────────

pub fn parse_long(input: &str) -> Vec<Result<RawStatementRow>> {
  let mut rdr = reader(input);
  let headers = match rdr.headers() {
    Ok(h) => h.clone(),
    Err(e) => return vec![Err(e.into())],
  };

  let mut idx = [0usize; 6];
  for (slot, name) in idx.iter_mut().zip(LONG_COLUMNS) {
    match headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
      Some(i) => *slot = i,
      None => return vec![Err(Error::MissingColumn(name))],
    }
  }

  rdr
    .records()
    .map(|record| {
      let record = record?;
      long_row(&record, &idx)
    })
    .collect()
}

fn long_row(record: &StringRecord, idx: &[usize; 6]) -> Result<RawStatementRow> {
  let line = line_of(record);
  let cell = |i: usize| record.get(idx[i]).unwrap_or_default();
  let vocab = |source| Error::Vocabulary { line, source };

  let ticker = cell(0).to_uppercase();
  if ticker.is_empty() {
    return Err(Error::MalformedRow { line, reason: "empty ticker".into() });
  }
  let field = cell(4);
  if field.is_empty() {
    return Err(Error::MalformedRow { line, reason: "empty field name".into() });
  }

  let end_date = parse_period_end(cell(1)).ok_or_else(|| Error::InvalidDate {
    line,
    value: cell(1).to_owned(),
  })?;
  let period_type = PeriodType::parse(cell(2)).map_err(vocab)?;
  let statement = StatementType::parse(cell(3)).map_err(vocab)?;

  Ok(RawStatementRow::new(
    FiscalPeriod::new(ticker, end_date, period_type),
    statement,
    field,
    opt_value(cell(5)),
  ))
}

// ─── Wide layout ─────────────────────────────────────────────────────────────

pub fn parse_wide(input: &str, layout: &WideLayout) -> Vec<Result<RawStatementRow>> {
  let mut rdr = reader(input);
  let headers = match rdr.headers() {
    Ok(h) => h.clone(),
    Err(e) => return vec![Err(e.into())],
  };
  let header_line = line_of(&headers).max(1);

  let mut results = Vec::new();
  let mut columns: Vec<(usize, FiscalPeriod)> = Vec::new();
  for (i, header) in headers.iter().enumerate().skip(1) {
    match parse_period_end(header) {
      Some(end) => columns.push((
        i,
        FiscalPeriod::new(layout.ticker.to_uppercase(), end, layout.period_type),
      )),
      None => results.push(Err(Error::InvalidDate {
        line:  header_line,
        value: header.to_owned(),
      })),
    }
  }
  if columns.is_empty() {
    results.push(Err(Error::MalformedRow {
      line:   header_line,
      reason: "no period columns in header".into(),
    }));
    return results;
  }

  for record in rdr.records() {
    let record = match record {
      Ok(r) => r,
      Err(e) => {
        results.push(Err(e.into()));
        continue;
      }
    };
    let metric = record.get(0).unwrap_or_default();
    if metric.is_empty() {
      results.push(Err(Error::MalformedRow {
        line:   line_of(&record),
        reason: "empty metric name".into(),
      }));
      continue;
    }

    for (i, period) in &columns {
      // Blank cells are periods the provider did not report.
      let Some(value) = record.get(*i).and_then(opt_value) else {
        continue;
      };
      results.push(Ok(RawStatementRow::new(
        period.clone(),
        layout.statement,
        metric,
        Some(value),
      )));
    }
  }

  debug!(rows = results.len(), ticker = %layout.ticker, "parsed wide statement");
  results
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  fn layout() -> WideLayout {
    WideLayout {
      ticker:      "aapl".into(),
      statement:   StatementType::Income,
      period_type: PeriodType::Annual,
    }
  }

  #[test]
  fn period_end_forms() {
    assert_eq!(parse_period_end("2024-09-28"), Some(date(2024, 9, 28)));
    assert_eq!(parse_period_end("2023"), Some(date(2023, 12, 31)));
    assert_eq!(parse_period_end("2024-09-28 00:00:00"), Some(date(2024, 9, 28)));
    assert_eq!(parse_period_end("2024-09-28T00:00:00Z"), Some(date(2024, 9, 28)));
    assert_eq!(parse_period_end("FY24"), None);
    assert_eq!(parse_period_end("2024-13-01"), None);
  }

  #[test]
  fn long_layout_reads_each_row() {
    let input = "\
ticker,period_end,period_type,statement,field,value
AAPL,2024-09-28,annual,income,Total Revenue,391035000000
aapl,2024-09-28,Annual,balance-sheet,Total Assets,
MSFT,2024,annual,cashflow,Capital Expenditure,(44477000000)
";
    let rows: Vec<_> = parse_long(input).into_iter().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].statement, StatementType::Income);
    assert_eq!(rows[0].value.as_deref(), Some("391035000000"));
    assert_eq!(rows[1].ticker(), "AAPL");
    assert_eq!(rows[1].statement, StatementType::Balance);
    assert_eq!(rows[1].value, None);
    assert_eq!(rows[2].period.end_date, date(2024, 12, 31));
    assert_eq!(rows[2].value.as_deref(), Some("(44477000000)"));
  }

  #[test]
  fn long_layout_tolerates_column_order() {
    let input = "\
value,field,statement,period_type,period_end,ticker
12.5,Net Income,income,quarterly,2024-06-29,NVDA
";
    let rows = parse_long(input);
    let row = rows[0].as_ref().unwrap();
    assert_eq!(row.period.period_type, PeriodType::Quarterly);
    assert_eq!(row.field_name_raw, "Net Income");
  }

  #[test]
  fn bad_rows_do_not_abort_the_file() {
    let input = "\
ticker,period_end,period_type,statement,field,value
AAPL,not-a-date,annual,income,Total Revenue,1
AAPL,2024-09-28,annual,equity,Total Revenue,1
,2024-09-28,annual,income,Total Revenue,1
AAPL,2024-09-28,annual,income,,1
AAPL,2024-09-28,annual,income,Net Income,93736000000
";
    let rows = parse_long(input);
    assert_eq!(rows.len(), 5);
    assert!(matches!(rows[0], Err(Error::InvalidDate { line: 2, .. })));
    assert!(matches!(rows[1], Err(Error::Vocabulary { line: 3, .. })));
    assert!(matches!(rows[2], Err(Error::MalformedRow { .. })));
    assert!(matches!(rows[3], Err(Error::MalformedRow { .. })));
    assert!(rows[4].is_ok());
  }

  #[test]
  fn long_layout_requires_every_column() {
    let rows = parse_long("ticker,period_end,statement,field,value\n");
    assert!(matches!(rows.as_slice(), [Err(Error::MissingColumn("period_type"))]));
  }

  #[test]
  fn wide_layout_spreads_columns_into_rows() {
    let input = "\
metric,2024-09-28,2023-09-30,2022
Total Revenue,391035000000,383285000000,394328000000
Net Income,93736000000,,99803000000
";
    let rows: Vec<_> = parse_wide(input, &layout())
      .into_iter()
      .map(Result::unwrap)
      .collect();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.ticker() == "AAPL"));
    assert!(rows.iter().all(|r| r.statement == StatementType::Income));
    assert_eq!(rows[2].period.end_date, date(2022, 12, 31));
    assert_eq!(rows[4].field_name_raw, "Net Income");
    assert_eq!(rows[4].value.as_deref(), Some("99803000000"));
  }

  #[test]
  fn wide_layout_reports_bad_headers_and_keeps_good_columns() {
    let input = "\
metric,2024-09-28,TTM
Total Revenue,391035000000,400000000000
";
    let rows = parse_wide(input, &layout());
    assert_eq!(rows.len(), 2);
    assert!(matches!(&rows[0], Err(Error::InvalidDate { value, .. }) if value == "TTM"));
    assert!(rows[1].is_ok());
  }

  #[test]
  fn wide_layout_without_periods_is_an_error() {
    let rows = parse_wide("metric\nTotal Revenue\n", &layout());
    assert!(matches!(rows.as_slice(), [Err(Error::MalformedRow { .. })]));
  }
}
