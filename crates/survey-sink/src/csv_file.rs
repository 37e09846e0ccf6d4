use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::row::cell_text;
use crate::sink::{SheetBackend, SinkUnavailableError};

/// Local CSV file used as a stand-in for a shared spreadsheet.
#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    /// Uses `path`, creating the file on first append. The parent directory must exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkUnavailableError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(SinkUnavailableError::NotFound {
                name: parent.display().to_string(),
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> SinkUnavailableError {
    SinkUnavailableError::Unreachable(format!("{}: {err}", path.display()))
}

impl SheetBackend for CsvSheet {
    fn describe(&self) -> String {
        format!("csv file {}", self.path.display())
    }

    fn header_row(&self) -> Result<Vec<String>, SinkUnavailableError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|err| io_error(&self.path, err))?;
        match reader.records().next() {
            Some(record) => {
                let record = record.map_err(|err| io_error(&self.path, err))?;
                Ok(record.iter().map(str::to_string).collect())
            }
            None => Ok(Vec::new()),
        }
    }

    fn append_rows(&self, rows: &[Vec<Value>]) -> Result<(), SinkUnavailableError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| io_error(&self.path, err))?;
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(file);
        for row in rows {
            writer
                .write_record(row.iter().map(cell_text))
                .map_err(|err| io_error(&self.path, err))?;
        }
        writer.flush().map_err(|err| io_error(&self.path, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::SubmittedRow;
    use crate::sink::append;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn appends_header_once() {
        let dir = TempDir::new().expect("temp dir");
        let sheet = CsvSheet::open(dir.path().join("responses.csv")).expect("open");
        for answers in [json!({ "age": 30, "smoker": "Oui" }), json!({ "age": 45, "smoker": "Non" })] {
            let answers = answers.as_object().cloned().expect("object");
            append(&sheet, &SubmittedRow::stamp(answers)).expect("append");
        }

        let contents = std::fs::read_to_string(sheet.path()).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "age,smoker,timestamp");
        assert!(lines[1].starts_with("30,Oui,"));
        assert!(lines[2].starts_with("45,Non,"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let result = CsvSheet::open(dir.path().join("nope").join("responses.csv"));
        assert!(matches!(result, Err(SinkUnavailableError::NotFound { .. })));
    }
}
