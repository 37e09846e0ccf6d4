//! Destinations that completed questionnaires are appended to.
//!
//! Every destination implements [`SheetBackend`]; [`append`] takes care of writing the header
//! row the first time and of matching later rows to it.

pub mod csv_file;
pub mod google;
pub mod memory;
pub mod row;
pub mod sink;

pub use csv_file::CsvSheet;
pub use google::{GoogleEndpoints, GoogleSheet, ServiceAccountKey};
pub use memory::MemorySheet;
pub use row::{SubmittedRow, TIMESTAMP_FIELD, TIMESTAMP_FORMAT, cell_text};
pub use sink::{AppendOutcome, SheetBackend, SinkUnavailableError, append};
