// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Vizier Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::error::{ParseError, ParseResult};
use calamine::{Data, Reader, Xls, Xlsx};
use polars::prelude::*;
use std::io::Cursor;
use tracing::{debug, warn};

/// A decoded upload: an ordered, equal-length set of named columns plus the
/// name it arrived under. Column order is preserved from the source file.
#[derive(Debug, Clone)]
pub struct Table {
    pub frame: DataFrame,
    pub source_name: String,
}

impl Table {
    pub fn rows(&self) -> usize {
        self.frame.height()
    }

    pub fn columns(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Xlsx,
    Xls,
    Parquet,
    Json,
}

fn format_for(filename: &str) -> ParseResult<SourceFormat> {
    let extension = filename
        .rsplit('.')
        .next()
        .filter(|ext| *ext != filename)
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "csv" => Ok(SourceFormat::Csv),
        "xlsx" => Ok(SourceFormat::Xlsx),
        "xls" => Ok(SourceFormat::Xls),
        "parquet" => Ok(SourceFormat::Parquet),
        "json" => Ok(SourceFormat::Json),
        _ => Err(ParseError::UnsupportedExtension { extension }),
    }
}

/// Decode raw upload bytes into a [`Table`] using the format implied by the
/// file extension. Fails on unsupported extensions, corrupt payloads, and
/// tables with zero rows or zero columns.
pub fn decode(bytes: &[u8], filename: &str) -> ParseResult<Table> {
    let format = format_for(filename)?;
    debug!(filename, ?format, size = bytes.len(), "decoding upload");
    let frame = match format {
        SourceFormat::Csv => decode_csv(bytes, filename)?,
        SourceFormat::Xlsx => decode_workbook(bytes, filename, true)?,
        SourceFormat::Xls => decode_workbook(bytes, filename, false)?,
        SourceFormat::Parquet => ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?,
        SourceFormat::Json => JsonReader::new(Cursor::new(bytes.to_vec())).finish()?,
    };
    if frame.width() == 0 {
        return Err(ParseError::NoColumns);
    }
    if frame.height() == 0 {
        return Err(ParseError::EmptyTable);
    }
    Ok(Table {
        frame,
        source_name: filename.to_string(),
    })
}

fn decode_csv(bytes: &[u8], filename: &str) -> ParseResult<DataFrame> {
    // Non-UTF-8 uploads are re-encoded lossily rather than rejected; the
    // replacement characters surface in the profile sample values.
    let owned = match std::str::from_utf8(bytes) {
        Ok(_) => bytes.to_vec(),
        Err(_) => {
            warn!(filename, "csv payload is not valid UTF-8, re-encoding lossily");
            String::from_utf8_lossy(bytes).into_owned().into_bytes()
        }
    };
    CsvReader::new(Cursor::new(owned))
        .finish()
        .map_err(ParseError::from)
}

fn decode_workbook(bytes: &[u8], filename: &str, xlsx: bool) -> ParseResult<DataFrame> {
    let cells = if xlsx {
        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes.to_vec())).map_err(|e| ParseError::Spreadsheet {
                reason: e.to_string(),
            })?;
        first_sheet_cells(&mut workbook)?
    } else {
        let mut workbook: Xls<_> =
            Xls::new(Cursor::new(bytes.to_vec())).map_err(|e| ParseError::Spreadsheet {
                reason: e.to_string(),
            })?;
        first_sheet_cells(&mut workbook)?
    };
    frame_from_cells(cells, filename)
}

fn first_sheet_cells<R>(workbook: &mut R) -> ParseResult<Vec<Vec<Option<String>>>>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Spreadsheet {
            reason: "workbook contains no sheets".to_string(),
        })?
        .map_err(|e| ParseError::Spreadsheet {
            reason: e.to_string(),
        })?;
    Ok(range.rows().map(|row| row.iter().map(cell_to_string).collect()).collect())
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| naive.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}

/// Build a string-typed frame from spreadsheet cells: first row is the
/// header, every later row a record. Semantic types are inferred downstream
/// by the profiler, exactly as for CSV input.
fn frame_from_cells(cells: Vec<Vec<Option<String>>>, filename: &str) -> ParseResult<DataFrame> {
    let mut rows = cells.into_iter();
    let header_row = rows.next().ok_or(ParseError::EmptyTable)?;
    if header_row.is_empty() {
        return Err(ParseError::NoColumns);
    }
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            cell.clone()
                .unwrap_or_else(|| format!("column_{index}"))
        })
        .collect();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (index, slot) in columns.iter_mut().enumerate() {
            slot.push(row.get(index).cloned().flatten());
        }
    }
    let series: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into_column())
        .collect();
    DataFrame::new(series).map_err(|e| ParseError::Decode {
        source_name: filename.to_string(),
        reason: e.to_string(),
    })
}
