//! Record source: reads the input CSV into row records.

use crate::error::SyncError;
use crate::types::{RecordSet, RowRecord};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read every row of a CSV file, preserving file order.
///
/// The first line is the header row. The `email` column is not checked
/// here; a missing column surfaces when the record is dispatched.
///
/// # Errors
///
/// - `SyncError::FileError` if the file cannot be opened
/// - `SyncError::ParseError` if the content is not valid CSV
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<RecordSet, SyncError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SyncError::file_error(path.to_string_lossy(), e.to_string()))?;

    let set = parse_records(file)?;
    tracing::debug!(
        path = %path.display(),
        rows = set.len(),
        columns = set.headers.len(),
        "loaded input file"
    );
    Ok(set)
}

/// Parse CSV content from any reader.
pub fn parse_records<R: Read>(reader: R) -> Result<RecordSet, SyncError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();

    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = result?;
        let fields = headers
            .iter()
            .cloned()
            .zip(row.iter().map(String::from))
            .collect();
        records.push(RowRecord::new(idx + 1, fields));
    }

    Ok(RecordSet { headers, records })
}
