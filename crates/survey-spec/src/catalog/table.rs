//! Raw cell grids read from catalog files.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use super::CatalogLoadError;

/// Header row plus data rows, every cell rendered as text.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Index of the column named `name`, ignoring case and surrounding whitespace.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Result<Self, CatalogLoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            _ => Err(CatalogLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

pub(crate) fn read_table(path: &Path) -> Result<RawTable, CatalogLoadError> {
    if !path.exists() {
        return Err(CatalogLoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    match SourceFormat::detect(path)? {
        SourceFormat::Csv => read_csv(path),
        SourceFormat::Workbook => read_workbook(path),
    }
}

fn read_csv(path: &Path) -> Result<RawTable, CatalogLoadError> {
    let malformed = |err: csv::Error| CatalogLoadError::Malformed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(malformed)?;

    let headers = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable { headers, rows })
}

fn read_workbook(path: &Path) -> Result<RawTable, CatalogLoadError> {
    let malformed = |reason: String| CatalogLoadError::Malformed {
        path: path.to_path_buf(),
        reason,
    };
    let mut workbook = open_workbook_auto(path).map_err(|err| malformed(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| malformed("workbook has no worksheet".into()))?
        .map_err(|err| malformed(err.to_string()))?;

    let mut grid = range.rows();
    let headers = grid
        .next()
        .ok_or_else(|| malformed("first worksheet is empty".into()))?
        .iter()
        .map(cell_text)
        .collect();
    let rows = grid.map(|row| row.iter().map(cell_text).collect()).collect();
    Ok(RawTable { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        other => other.to_string(),
    }
}
