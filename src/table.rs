//! In-memory table
//!
//! The full record set loaded from the backing file, mutated in memory,
//! and persisted back in one atomic replace. Whole-file rewrite is
//! deliberate at this scale: durability and atomicity trump micro-
//! efficiency, and reasoning stays simple ("load, transform, persist").
//!
//! The ID allocator lives here: the next ID is recomputed from the live
//! rows on every allocation instead of being persisted in a counter file
//! that could drift out of sync with the data. Allocation is only ever
//! called behind the table lock, so the O(n) scan is already serialized.

use std::fs;
use std::path::Path;

use crate::atomic::{atomic_replace, RetryPolicy};
use crate::error::{Result, RosterError};
use crate::record::codec::{decode_record, encode_record, split_rows};
use crate::record::{header_line, Record};

/// The full ordered record set
#[derive(Debug, Clone, Default)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    /// Load and parse the backing file
    ///
    /// The first logical row must be the expected header. Any undecodable
    /// row or a duplicate ID aborts the scan with [`RosterError::Corrupt`];
    /// the store never attempts automatic repair.
    pub fn load(path: &Path) -> Result<Table> {
        let content = fs::read_to_string(path)?;
        let rows = split_rows(&content);

        let mut rows = rows.into_iter();
        match rows.next() {
            Some(header) if header == header_line() => {}
            Some(header) => {
                return Err(RosterError::Corrupt(format!(
                    "unexpected header: {:?}",
                    header
                )))
            }
            None => return Err(RosterError::Corrupt("empty table file".to_string())),
        }

        let mut records = Vec::new();
        for row in rows {
            if row.is_empty() {
                continue;
            }
            let record = decode_record(&row)?;
            if records.iter().any(|r: &Record| r.id == record.id) {
                return Err(RosterError::Corrupt(format!(
                    "duplicate record id {} (externally edited file?)",
                    record.id
                )));
            }
            records.push(record);
        }

        Ok(Table { records })
    }

    /// Persist the whole table through the atomic writer
    pub fn persist(&self, path: &Path, policy: &RetryPolicy) -> Result<()> {
        atomic_replace(path, || Ok(self.to_file_content()), policy)
    }

    /// Render header plus all rows, each terminated by a line break
    pub fn to_file_content(&self) -> String {
        let mut content = header_line();
        content.push('\n');
        for record in &self.records {
            content.push_str(&encode_record(record));
            content.push('\n');
        }
        content
    }

    /// Header-only content for first initialization
    pub fn empty_file_content() -> String {
        let mut content = header_line();
        content.push('\n');
        content
    }

    // =========================================================================
    // ID allocation
    // =========================================================================

    /// Next unique ID: `max(existing) + 1`, or 1 for an empty table
    ///
    /// Must only be called while holding the table lock.
    pub fn next_id(&self) -> u64 {
        self.records.iter().map(|r| r.id).max().map_or(1, |id| id + 1)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: u64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Whether a live record other than `exclude_id` already uses `code`
    pub fn code_in_use(&self, code: &str, exclude_id: Option<u64>) -> bool {
        self.records
            .iter()
            .any(|r| r.student_code == code && Some(r.id) != exclude_id)
    }

    // =========================================================================
    // In-memory mutations (persisted by the caller)
    // =========================================================================

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Replace the record with the same id; `NotFound` if absent
    pub fn replace(&mut self, record: Record) -> Result<()> {
        let idx = self
            .position(record.id)
            .ok_or(RosterError::NotFound { id: record.id })?;
        self.records[idx] = record;
        Ok(())
    }

    /// Remove and return the record with `id`; `NotFound` if absent
    pub fn remove(&mut self, id: u64) -> Result<Record> {
        let idx = self.position(id).ok_or(RosterError::NotFound { id })?;
        Ok(self.records.remove(idx))
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
