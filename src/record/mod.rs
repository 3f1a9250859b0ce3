//! Record types
//!
//! The fixed row schema of the table, plus the input shapes used by the
//! store: a draft for `create` and a patch for `update`.

pub mod codec;

pub use codec::{decode_record, encode_record, DELIMITER, QUOTE};

/// Field names in file order; the first line of the backing file is exactly
/// these joined by the delimiter.
pub const FIELD_NAMES: [&str; 8] = [
    "ID",
    "StudentCode",
    "FirstName",
    "LastName",
    "Email",
    "Phone",
    "GPA",
    "RegistrationDate",
];

/// Number of fields per row
pub const FIELD_COUNT: usize = FIELD_NAMES.len();

/// One row of the table
///
/// `id` is assigned by the store and immutable afterwards. `student_code`
/// is unique among live records. `gpa` is validated to [0, 20] with at most
/// two fractional digits before it ever reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u64,
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gpa: f64,
    pub registered_at: String,
}

/// Caller-supplied fields for a new record
///
/// The store assigns `id` and stamps `registered_at` itself.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gpa: f64,
}

/// Partial update for an existing record
///
/// A field left as `None` keeps its current value; `id` and
/// `registered_at` can never be patched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub student_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gpa: Option<f64>,
}

impl RecordPatch {
    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.student_code.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.gpa.is_none()
    }
}

impl Record {
    /// Apply a patch, keeping current values for absent fields
    pub fn merged(&self, patch: &RecordPatch) -> Record {
        Record {
            id: self.id,
            student_code: patch
                .student_code
                .clone()
                .unwrap_or_else(|| self.student_code.clone()),
            first_name: patch
                .first_name
                .clone()
                .unwrap_or_else(|| self.first_name.clone()),
            last_name: patch
                .last_name
                .clone()
                .unwrap_or_else(|| self.last_name.clone()),
            email: patch.email.clone().unwrap_or_else(|| self.email.clone()),
            phone: patch.phone.clone().unwrap_or_else(|| self.phone.clone()),
            gpa: patch.gpa.unwrap_or(self.gpa),
            registered_at: self.registered_at.clone(),
        }
    }

    /// Case-insensitive substring match over the searchable fields
    /// (code, first name, last name, email)
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.student_code.to_lowercase().contains(&needle)
            || self.first_name.to_lowercase().contains(&needle)
            || self.last_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
    }
}

/// The header line of the backing file
pub fn header_line() -> String {
    FIELD_NAMES.join(",")
}
