//! Boundary-point CSV reading.

use std::{fs::File, path::Path};

use polars::{error::PolarsError, io::SerReader, prelude::{CsvEncoding, CsvReadOptions, StringChunked}};

use crate::config::CSV_HEADER;
use crate::error::PermitError;
use crate::permit::{CoordinateRow, PermitNumber};

/// Open a semicolon-delimited boundary-point file and validate its header.
///
/// The whole file is loaded up front with every column read as text.
/// Invalid UTF-8 is replaced rather than rejected. Numeric coercion happens
/// row by row in [`CoordinateRows`], which skips rows that do not parse.
pub fn read_coordinates(path: &Path) -> Result<CoordinateRows, PermitError> {
    let file = File::open(path)
        .map_err(|source| PermitError::FileNotFound { path: path.to_path_buf(), source })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|po| po
            .with_separator(b';')
            .with_encoding(CsvEncoding::LossyUtf8)
            .with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(file)
        .finish();

    let df = match df {
        Ok(df) => df,
        Err(PolarsError::NoData(_)) => return Err(header_mismatch(Vec::new())),
        Err(source) => return Err(PermitError::CsvRead { path: path.to_path_buf(), source }),
    };

    let found = df.get_column_names().iter()
        .map(|name| name.as_str().trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();
    if found.iter().map(String::as_str).ne(CSV_HEADER) {
        return Err(header_mismatch(found));
    }

    let columns = df.get_columns().iter()
        .map(|column| column.str().cloned())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| PermitError::CsvRead { path: path.to_path_buf(), source })?;

    Ok(CoordinateRows { columns, next: 0, len: df.height(), skipped: 0 })
}

fn header_mismatch(found: Vec<String>) -> PermitError {
    PermitError::HeaderMismatch {
        expected: CSV_HEADER.iter().map(|s| s.to_string()).collect(),
        found,
    }
}

/// Parse a numeric field; blanks, missing cells and non-finite values are rejected.
fn parse_field(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Iterator over the well-formed rows of a boundary-point file.
///
/// Single pass: once exhausted, re-open the file to read it again.
#[derive(Debug)]
pub struct CoordinateRows {
    columns: Vec<StringChunked>, // BORNE, X, Y, NUM_PM
    next: usize,
    len: usize,
    skipped: usize,
}

impl CoordinateRows {
    /// Number of malformed rows skipped so far.
    #[inline] pub fn skipped(&self) -> usize { self.skipped }

    fn parse_row(&self, i: usize) -> Option<CoordinateRow> {
        let x = parse_field(self.columns[1].get(i))?;
        let y = parse_field(self.columns[2].get(i))?;
        let permit = PermitNumber::new(parse_field(self.columns[3].get(i))?)?;
        let borne = self.columns[0].get(i).unwrap_or_default().to_string();
        Some(CoordinateRow { borne, x, y, permit })
    }
}

impl Iterator for CoordinateRows {
    type Item = CoordinateRow;

    fn next(&mut self) -> Option<CoordinateRow> {
        while self.next < self.len {
            let i = self.next;
            self.next += 1;
            match self.parse_row(i) {
                Some(row) => return Some(row),
                None => {
                    self.skipped += 1;
                    log::debug!("[io::csv::read] skipping malformed row {}", i + 2);
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.len - self.next))
    }
}
