use serde_json::{Map, Value, json};
use survey_sink::{
    CsvSheet, MemorySheet, SheetBackend, SinkUnavailableError, SubmittedRow, append,
};
use tempfile::TempDir;

fn submission(value: Value) -> SubmittedRow {
    let answers: Map<String, Value> = value.as_object().cloned().expect("object");
    SubmittedRow::stamp(answers)
}

#[test]
fn header_is_written_once_across_submissions() {
    let sheet = MemorySheet::new("Questionnaire_Responses");
    assert!(sheet.header_row().expect("header").is_empty());

    let first = append(&sheet, &submission(json!({ "age": 30, "smoker": "Oui" }))).expect("first");
    let second = append(&sheet, &submission(json!({ "age": 52, "smoker": "Non" }))).expect("second");
    assert!(first.wrote_header);
    assert!(!second.wrote_header);

    assert_eq!(
        sheet.header_row().expect("header"),
        vec!["age", "smoker", "timestamp"]
    );
    let rows = sheet.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2][0], json!(52));
}

#[test]
fn unreachable_sheet_keeps_nothing_and_recovers() {
    let sheet = MemorySheet::new("Questionnaire_Responses");
    sheet.set_reachable(false);
    let row = submission(json!({ "age": 30 }));
    let err = append(&sheet, &row).expect_err("offline");
    assert!(matches!(err, SinkUnavailableError::Unreachable(_)));
    assert!(err.to_string().contains("offline"));

    sheet.set_reachable(true);
    append(&sheet, &row).expect("retry");
    assert_eq!(sheet.rows().len(), 2);
}

#[test]
fn csv_sheet_reads_back_its_header() {
    let dir = TempDir::new().expect("temp dir");
    let sheet = CsvSheet::open(dir.path().join("responses.csv")).expect("open");
    append(&sheet, &submission(json!({ "brand": "Gauloises", "age": 41 }))).expect("append");

    assert_eq!(
        sheet.header_row().expect("header"),
        vec!["brand", "age", "timestamp"]
    );
}
