//! Sheet and workbook writers.

use std::{
  io,
  path::{Path, PathBuf},
};

use csv::Writer;
use finhealth_core::report::{Sheet, Workbook};

use crate::error::Result;

pub fn write_sheet<W: io::Write>(sheet: &Sheet, out: W) -> Result<()> {
  let mut wtr = Writer::from_writer(out);
  wtr.write_record(&sheet.headers)?;
  for row in &sheet.rows {
    wtr.write_record(row.iter().map(|cell| cell.render()))?;
  }
  wtr.flush()?;
  Ok(())
}

pub fn sheet_to_string(sheet: &Sheet) -> Result<String> {
  let mut buf = Vec::new();
  write_sheet(sheet, &mut buf)?;
  Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn write_workbook(book: &Workbook, dir: &Path) -> Result<Vec<PathBuf>> {
  std::fs::create_dir_all(dir)?;
  book
    .sheets
    .iter()
    .map(|sheet| {
      let path = dir.join(format!("{}.csv", sheet.slug()));
      write_sheet(sheet, std::fs::File::create(&path)?)?;
      Ok(path)
    })
    .collect()
}
