//! CSV report output
//!
//! Excel only detects UTF-8 in a CSV when the file starts with a byte-order
//! mark, so one is written by default. The BOM is emitted ahead of the CSV
//! writer; everything after it is the same bytes either way.

use crate::error::Result;
use crate::report::ReportRecord;
use ::csv::{Terminator, WriterBuilder};
use std::io::Write;
use std::path::Path;

pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub fn write_csv<R, W>(records: &[R], mut writer: W, bom: bool) -> Result<()>
where
    R: ReportRecord,
    W: Write,
{
    if bom {
        writer.write_all(UTF8_BOM)?;
    }

    let mut csv = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(writer);

    csv.write_record(R::HEADERS)?;
    for record in records {
        csv.write_record(record.row())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_bytes<R: ReportRecord>(records: &[R], bom: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf, bom)?;
    Ok(buf)
}

pub fn write_csv_file<R: ReportRecord>(records: &[R], path: &Path, bom: bool) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(records, std::io::BufWriter::new(file), bom)?;
    tracing::debug!("Wrote {} CSV row(s) to {}", records.len(), path.display());
    Ok(())
}
