use crate::error::{AppError, Result};
use crate::sheets::{CellValue, Table};
use std::io::Write;

impl CellValue {
    /// CSV field text: integers in decimal, floats fixed-point with six
    /// decimals, text unchanged.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => format!("{:.6}", f),
            CellValue::Text(s) => s.clone(),
        }
    }
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder
        .has_headers(false)
        // Trailing empty cells are omitted by the API, so rows are ragged
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary);
    builder
}

/// Write every row of `table` as CSV, in order.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut csv_writer = writer_builder().from_writer(writer);
    for row in &table.rows {
        csv_writer.write_record(row.iter().map(CellValue::to_field))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn transcribe(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| AppError::Other(e.into()))
}
