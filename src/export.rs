//! File export for cohort tables.
//!
//! The target format is chosen from the file extension; an unrecognized
//! extension is a fatal error with no silent fallback.

use std::fs::File;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::Workbook;

use crate::error::{CohortError, Result};
use crate::values;

/// Write a record batch to `path` as CSV, Excel, or Parquet.
pub fn write_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => write_csv(batch, path),
        Some("parquet") => write_parquet(batch, path),
        Some("xlsx") => write_xlsx(batch, path),
        _ => Err(CohortError::UnsupportedFormat(path.display().to_string())),
    }
}

fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(file);
    writer.write(batch)?;
    Ok(())
}

fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn write_xlsx(batch: &RecordBatch, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, field) in batch.schema().fields().iter().enumerate() {
        worksheet.write_string(0, col as u16, field.name().as_str())?;
    }

    for row in 0..batch.num_rows() {
        for col in 0..batch.num_columns() {
            if let Some(value) = values::display_at(batch.column(col), row) {
                worksheet.write_string((row + 1) as u32, col as u16, value.as_str())?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}
