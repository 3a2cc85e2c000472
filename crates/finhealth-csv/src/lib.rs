//! CSV codec for the financial-health pipeline.
//!
//! Reads provider statement dumps into [`RawStatementRow`]s and writes report
//! sheets back out. Pure synchronous; no database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use finhealth_csv::parse_long;
//!
//! let csv = "ticker,period_end,period_type,statement,field,value\n\
//!            AAPL,2024-09-28,annual,income,Total Revenue,391035000000\n";
//! let rows: Vec<_> = parse_long(csv).into_iter().filter_map(Result::ok).collect();
//! println!("{} rows", rows.len());
//! ```

pub mod error;
mod parse;
mod serialize;

pub use error::{Error, Result};
use finhealth_core::{company::PeriodType, statement::RawStatementRow, vocab::StatementType};
pub use parse::LONG_COLUMNS;
pub use serialize::{sheet_to_string, write_sheet, write_workbook};

/// What a wide statement dump cannot say for itself.
#[derive(Debug, Clone)]
pub struct WideLayout {
  pub ticker:      String,
  pub statement:   StatementType,
  pub period_type: PeriodType,
}

/// Parse a long-layout file (`ticker,period_end,period_type,statement,field,value`).
///
/// Columns may come in any order. Each record is parsed independently; a
/// malformed record yields `Err(…)` in the corresponding position without
/// aborting the rest.
pub fn parse_long(input: &str) -> Vec<Result<RawStatementRow>> { parse::parse_long(input) }

/// Parse a wide provider dump: the first column names the metric and every
/// further header is a period end (`YYYY-MM-DD` or a bare `YYYY`).
///
/// Blank cells are skipped. A header that is not a date yields one `Err` and
/// its column is ignored.
pub fn parse_wide(input: &str, layout: &WideLayout) -> Vec<Result<RawStatementRow>> {
  parse::parse_wide(input, layout)
}
