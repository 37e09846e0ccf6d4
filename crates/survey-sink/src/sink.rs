use serde_json::Value;
use thiserror::Error;

use crate::row::SubmittedRow;

/// The submission destination could not be opened, read or written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkUnavailableError {
    /// Network or file-system failure reaching the destination.
    #[error("destination unreachable: {0}")]
    Unreachable(String),

    /// No destination with the configured name exists or is shared with the credentials.
    #[error("destination '{name}' not found; check its name and sharing settings")]
    NotFound { name: String },

    /// The credentials could not be read or were refused.
    #[error("credentials rejected: {0}")]
    Credentials(String),

    /// The remote API answered with an error status.
    #[error("destination returned HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response could not be understood.
    #[error("unexpected response from destination: {0}")]
    InvalidResponse(String),
}

/// A tabular store that rows can be appended to.
pub trait SheetBackend {
    /// Human-readable destination name for logs and messages.
    fn describe(&self) -> String;

    /// Contents of the first row; empty when nothing has been written yet.
    fn header_row(&self) -> Result<Vec<String>, SinkUnavailableError>;

    /// Appends `rows` after the last written row.
    fn append_rows(&self, rows: &[Vec<Value>]) -> Result<(), SinkUnavailableError>;
}

/// What [`append`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub wrote_header: bool,
}

/// Appends `row`, writing a header row first when the destination has none.
pub fn append(
    backend: &dyn SheetBackend,
    row: &SubmittedRow,
) -> Result<AppendOutcome, SinkUnavailableError> {
    let header = backend.header_row()?;
    let has_header = header.iter().any(|cell| !cell.trim().is_empty());

    if !has_header {
        backend.append_rows(&[
            row.header().into_iter().map(Value::String).collect(),
            row.values(),
        ])?;
        tracing::info!(destination = %backend.describe(), "wrote header and first submission");
        return Ok(AppendOutcome { wrote_header: true });
    }

    let (values, extra) = row.values_for(&header);
    if !extra.is_empty() {
        tracing::warn!(
            destination = %backend.describe(),
            fields = ?extra,
            "submission has fields missing from the destination header; appending them last"
        );
    }
    backend.append_rows(&[values])?;
    tracing::info!(destination = %backend.describe(), "appended submission");
    Ok(AppendOutcome {
        wrote_header: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySheet;
    use serde_json::{Map, json};

    fn row(value: Value) -> SubmittedRow {
        let map: Map<String, Value> = value.as_object().cloned().expect("object");
        SubmittedRow::stamp(map)
    }

    #[test]
    fn first_append_writes_header_then_row() {
        let sheet = MemorySheet::new("responses");
        let outcome = append(&sheet, &row(json!({ "age": 30, "smoker": "Oui" }))).expect("append");
        assert!(outcome.wrote_header);

        let rows = sheet.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![json!("age"), json!("smoker"), json!("timestamp")]);
        assert_eq!(rows[1][..2], [json!(30), json!("Oui")]);
    }

    #[test]
    fn later_appends_write_only_data() {
        let sheet = MemorySheet::new("responses");
        append(&sheet, &row(json!({ "age": 30, "smoker": "Oui" }))).expect("first");
        let outcome = append(&sheet, &row(json!({ "age": 45, "smoker": "Non" }))).expect("second");
        assert!(!outcome.wrote_header);

        let rows = sheet.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][..2], [json!(45), json!("Non")]);
    }

    #[test]
    fn data_follows_existing_column_order() {
        let sheet = MemorySheet::with_rows(
            "responses",
            vec![vec![json!("smoker"), json!("age"), json!("timestamp")]],
        );
        append(&sheet, &row(json!({ "age": 45, "smoker": "Non" }))).expect("append");
        let rows = sheet.rows();
        assert_eq!(rows[1][..2], [json!("Non"), json!(45)]);
    }

    #[test]
    fn unreachable_destination_is_an_error() {
        let sheet = MemorySheet::new("responses");
        sheet.set_reachable(false);
        let result = append(&sheet, &row(json!({ "age": 30 })));
        assert!(matches!(result, Err(SinkUnavailableError::Unreachable(_))));
        assert!(sheet.rows().is_empty());
    }
}
