use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::row::cell_text;
use crate::sink::{SheetBackend, SinkUnavailableError};

/// Sheet kept in memory, for previews and tests.
#[derive(Debug)]
pub struct MemorySheet {
    name: String,
    rows: Mutex<Vec<Vec<Value>>>,
    reachable: AtomicBool,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rows(name, Vec::new())
    }

    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            rows: Mutex::new(rows),
            reachable: AtomicBool::new(true),
        }
    }

    /// Simulates the destination going offline or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_reachable(&self) -> Result<(), SinkUnavailableError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SinkUnavailableError::Unreachable(format!(
                "sheet '{}' is offline",
                self.name
            )))
        }
    }
}

impl SheetBackend for MemorySheet {
    fn describe(&self) -> String {
        format!("memory sheet '{}'", self.name)
    }

    fn header_row(&self) -> Result<Vec<String>, SinkUnavailableError> {
        self.ensure_reachable()?;
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default())
    }

    fn append_rows(&self, rows: &[Vec<Value>]) -> Result<(), SinkUnavailableError> {
        self.ensure_reachable()?;
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rows.iter().cloned());
        Ok(())
    }
}
