use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::api::ResultRow;
use crate::error::ActionError;

/// Destination for copied text.
pub trait ClipboardSink: Send {
    fn write_text(&mut self, text: &str) -> Result<(), ActionError>;
}

/// The desktop clipboard, opened on first use and kept for the process.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        if self.inner.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|err| ActionError::Clipboard(err.to_string()))?;
            self.inner = Some(clipboard);
        }
        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ActionError::Clipboard("clipboard not initialised".into()));
        };
        clipboard
            .set_text(text.to_owned())
            .map_err(|err| ActionError::Clipboard(err.to_string()))
    }
}

/// In-process clipboard; clones share the same history.
#[derive(Clone, Default)]
pub struct MemoryClipboard {
    history: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail with `reason` (or succeed again on `None`).
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_owned);
    }

    pub fn contents(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(ActionError::Clipboard(reason));
        }
        self.history.lock().push(text.to_owned());
        Ok(())
    }
}

pub fn copy_one(sink: &mut dyn ClipboardSink, link: &str) -> Result<(), ActionError> {
    debug!(len = link.len(), "copy link");
    sink.write_text(link)
}

/// Copies every row's link, one per line, and returns how many were copied.
pub fn copy_all(sink: &mut dyn ClipboardSink, rows: &[ResultRow]) -> Result<usize, ActionError> {
    let joined = join_links(rows);
    debug!(count = rows.len(), "copy all links");
    sink.write_text(&joined)?;
    Ok(rows.len())
}

pub fn join_links(rows: &[ResultRow]) -> String {
    rows.iter()
        .map(|row| row.link.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(links: &[&str]) -> Vec<ResultRow> {
        links
            .iter()
            .map(|link| ResultRow {
                thread_id: "t".into(),
                link: (*link).into(),
                ..ResultRow::default()
            })
            .collect()
    }

    #[test]
    fn copy_all_joins_with_newlines() {
        let mut clipboard = MemoryClipboard::new();
        let copied = copy_all(&mut clipboard, &rows(&["x", "y", "z"])).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(clipboard.contents().as_deref(), Some("x\ny\nz"));
    }

    #[test]
    fn copy_one_writes_literal_link() {
        let mut clipboard = MemoryClipboard::new();
        copy_one(&mut clipboard, "ed2k://|file|a b|12|HASH|/").unwrap();
        assert_eq!(
            clipboard.contents().as_deref(),
            Some("ed2k://|file|a b|12|HASH|/")
        );
    }

    #[test]
    fn failures_carry_the_cause() {
        let mut clipboard = MemoryClipboard::new();
        clipboard.fail_with(Some("no display"));
        let err = copy_one(&mut clipboard, "x").unwrap_err();
        assert_eq!(err, ActionError::Clipboard("no display".into()));
        assert_eq!(clipboard.contents(), None);
    }
}
