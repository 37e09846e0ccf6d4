//! Google Sheets destination.
//!
//! The spreadsheet is located by name through the Drive API, and rows go to its first
//! worksheet through the Sheets `values` API.

mod auth;

pub use auth::{SCOPES, ServiceAccountKey, TokenProvider};

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::row::cell_text;
use crate::sink::{SheetBackend, SinkUnavailableError};

pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Base URLs of the Drive and Sheets APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    /// Drive v3 `files` collection, used to look spreadsheets up by name.
    pub drive_files: String,
    /// Sheets v4 `spreadsheets` collection.
    pub sheets: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            drive_files: DRIVE_FILES_URL.to_string(),
            sheets: SHEETS_API_URL.to_string(),
        }
    }
}

/// First worksheet of a named spreadsheet shared with a service account.
pub struct GoogleSheet {
    name: String,
    spreadsheet_id: String,
    worksheet: String,
    endpoints: GoogleEndpoints,
    client: Client,
    tokens: TokenProvider,
}

impl GoogleSheet {
    /// Authenticates and resolves `name` to a spreadsheet and its first worksheet.
    pub fn open(key: ServiceAccountKey, name: &str) -> Result<Self, SinkUnavailableError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SinkUnavailableError::Unreachable(err.to_string()))?;
        Self::open_with(key, name, GoogleEndpoints::default(), client)
    }

    /// Same as [`GoogleSheet::open`] against explicit endpoints and HTTP client.
    pub fn open_with(
        key: ServiceAccountKey,
        name: &str,
        endpoints: GoogleEndpoints,
        client: Client,
    ) -> Result<Self, SinkUnavailableError> {
        let tokens = TokenProvider::new(key, client.clone())?;

        let spreadsheet_id = find_spreadsheet(&client, &tokens, &endpoints, name)?;
        let worksheet = first_worksheet(&client, &tokens, &endpoints, &spreadsheet_id)?;
        info!(
            spreadsheet = name,
            worksheet = %worksheet,
            account = tokens.client_email(),
            "opened spreadsheet"
        );
        Ok(Self {
            name: name.to_string(),
            spreadsheet_id,
            worksheet,
            endpoints,
            client,
            tokens,
        })
    }

    fn range(&self, cells: &str) -> String {
        format!("'{}'!{cells}", self.worksheet.replace('\'', "''"))
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, SinkUnavailableError> {
        sheets_url(
            &self.endpoints.sheets,
            &[
                self.spreadsheet_id.as_str(),
                "values",
                &format!("{range}{suffix}"),
            ],
        )
    }
}

impl SheetBackend for GoogleSheet {
    fn describe(&self) -> String {
        format!("Google spreadsheet '{}'", self.name)
    }

    fn header_row(&self) -> Result<Vec<String>, SinkUnavailableError> {
        let url = self.values_url(&self.range("1:1"), "")?;
        let range: ValueRange = send_json(authorized(
            self.client.get(url),
            &self.tokens,
        )?)?;
        Ok(header_from(range))
    }

    fn append_rows(&self, rows: &[Vec<Value>]) -> Result<(), SinkUnavailableError> {
        let url = self.values_url(&self.range("A1"), ":append")?;
        let rows: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| row.iter().map(sheet_cell).collect())
            .collect();
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        let _: Value = send_json(authorized(request, &self.tokens)?)?;
        debug!(spreadsheet = %self.name, rows = rows.len(), "appended rows");
        Ok(())
    }
}

/// The first row of a `values` range. An empty worksheet has no `values` key at all.
fn header_from(range: ValueRange) -> Vec<String> {
    range
        .values
        .first()
        .map(|row| row.iter().map(cell_text).collect())
        .unwrap_or_default()
}

fn first_file(list: FileList, name: &str) -> Result<String, SinkUnavailableError> {
    list.files
        .into_iter()
        .next()
        .map(|file| file.id)
        .ok_or_else(|| SinkUnavailableError::NotFound {
            name: name.to_string(),
        })
}

fn first_title(
    meta: SpreadsheetMeta,
    spreadsheet_id: &str,
) -> Result<String, SinkUnavailableError> {
    meta.sheets
        .into_iter()
        .next()
        .map(|sheet| sheet.properties.title)
        .ok_or_else(|| {
            SinkUnavailableError::InvalidResponse(format!(
                "spreadsheet {spreadsheet_id} has no worksheets"
            ))
        })
}

/// Numbers, strings and booleans go through as-is; anything else as text.
fn sheet_cell(value: &Value) -> Value {
    match value {
        Value::Number(_) | Value::String(_) | Value::Bool(_) => value.clone(),
        other => Value::String(cell_text(other)),
    }
}

fn find_spreadsheet(
    client: &Client,
    tokens: &TokenProvider,
    endpoints: &GoogleEndpoints,
    name: &str,
) -> Result<String, SinkUnavailableError> {
    let query = format!(
        "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
        name.replace('\\', "\\\\").replace('\'', "\\'")
    );
    let request = client.get(&endpoints.drive_files).query(&[
        ("q", query.as_str()),
        ("fields", "files(id)"),
        ("pageSize", "1"),
        ("supportsAllDrives", "true"),
        ("includeItemsFromAllDrives", "true"),
    ]);
    let list: FileList = send_json(authorized(request, tokens)?)?;
    first_file(list, name)
}

fn first_worksheet(
    client: &Client,
    tokens: &TokenProvider,
    endpoints: &GoogleEndpoints,
    spreadsheet_id: &str,
) -> Result<String, SinkUnavailableError> {
    let url = sheets_url(&endpoints.sheets, &[spreadsheet_id])?;
    let request = client
        .get(url)
        .query(&[("fields", "sheets.properties.title")]);
    let meta: SpreadsheetMeta = send_json(authorized(request, tokens)?)?;
    first_title(meta, spreadsheet_id)
}

fn sheets_url(base: &str, segments: &[&str]) -> Result<Url, SinkUnavailableError> {
    let mut url = Url::parse(base)
        .map_err(|err| SinkUnavailableError::InvalidResponse(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| SinkUnavailableError::InvalidResponse("base URL cannot hold a path".into()))?
        .extend(segments);
    Ok(url)
}

fn authorized(
    request: RequestBuilder,
    tokens: &TokenProvider,
) -> Result<RequestBuilder, SinkUnavailableError> {
    Ok(request.bearer_auth(tokens.token()?))
}

fn send_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, SinkUnavailableError> {
    let response = request
        .send()
        .map_err(|err| SinkUnavailableError::Unreachable(err.to_string()))?;
    check_status(response)?
        .json()
        .map_err(|err| SinkUnavailableError::InvalidResponse(err.to_string()))
}

fn check_status(response: Response) -> Result<Response, SinkUnavailableError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(rejection(status, &body))
}

/// Prefers the `error.message` of a Google error body over the raw text.
fn rejection(status: StatusCode, body: &str) -> SinkUnavailableError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    SinkUnavailableError::Rejected {
        status: status.as_u16(),
        message,
    }
}
