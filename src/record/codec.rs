//! Record codec
//!
//! Encodes one record to one CSV row and back, with RFC-4180 quoting.
//!
//! ## Row Format
//!
//! ```text
//! ID,StudentCode,FirstName,LastName,Email,Phone,GPA,RegistrationDate
//! ```
//!
//! A field is emitted bare unless it contains the delimiter, a quote, or a
//! line break; such fields are wrapped in quotes with every inner quote
//! doubled. A quoted field may therefore span physical lines, which is why
//! the file is split into logical rows with [`split_rows`] rather than a
//! plain line iterator. A naive split on the delimiter would silently
//! corrupt any name or code containing a comma.

use crate::error::{Result, RosterError};
use super::{Record, FIELD_COUNT};

/// Field delimiter
pub const DELIMITER: char = ',';

/// Quote character
pub const QUOTE: char = '"';

// =============================================================================
// Encoding
// =============================================================================

/// Encode a record as one CSV row (no trailing line break)
pub fn encode_record(record: &Record) -> String {
    let fields = [
        record.id.to_string(),
        record.student_code.clone(),
        record.first_name.clone(),
        record.last_name.clone(),
        record.email.clone(),
        record.phone.clone(),
        format_gpa(record.gpa),
        record.registered_at.clone(),
    ];

    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(DELIMITER);
        }
        encode_field(&mut row, field);
    }
    row
}

/// Append one field to the row, quoting if required
fn encode_field(row: &mut String, field: &str) {
    if !needs_quoting(field) {
        row.push_str(field);
        return;
    }

    row.push(QUOTE);
    for ch in field.chars() {
        if ch == QUOTE {
            // Inner quotes are doubled
            row.push(QUOTE);
        }
        row.push(ch);
    }
    row.push(QUOTE);
}

fn needs_quoting(field: &str) -> bool {
    field.contains(DELIMITER) || field.contains(QUOTE) || field.contains('\n') || field.contains('\r')
}

/// GPA has at most two fractional digits; `{}` prints the shortest exact
/// representation, so such values round-trip through parse unchanged.
fn format_gpa(gpa: f64) -> String {
    format!("{}", gpa)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one logical CSV row into a record
///
/// Fails with [`RosterError::Corrupt`] on a wrong field count, an unclosed
/// quote, or an unparsable id/GPA.
pub fn decode_record(row: &str) -> Result<Record> {
    let fields = split_fields(row)?;

    if fields.len() != FIELD_COUNT {
        return Err(RosterError::Corrupt(format!(
            "malformed record: expected {} fields, got {}: {:?}",
            FIELD_COUNT,
            fields.len(),
            row
        )));
    }

    let id: u64 = fields[0]
        .parse()
        .map_err(|_| RosterError::Corrupt(format!("invalid record id: {:?}", fields[0])))?;

    let gpa: f64 = fields[6]
        .parse()
        .map_err(|_| RosterError::Corrupt(format!("invalid GPA value: {:?}", fields[6])))?;

    Ok(Record {
        id,
        student_code: fields[1].clone(),
        first_name: fields[2].clone(),
        last_name: fields[3].clone(),
        email: fields[4].clone(),
        phone: fields[5].clone(),
        gpa,
        registered_at: fields[7].clone(),
    })
}

/// Split one logical row into fields, honoring quoting
///
/// Wrapping quotes are stripped and doubled inner quotes collapsed.
pub fn split_fields(row: &str) -> Result<Vec<String>> {
    let mut fields = Vec::with_capacity(FIELD_COUNT);
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    // Doubled quote inside a quoted field
                    chars.next();
                    current.push(QUOTE);
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == QUOTE && current.is_empty() {
            in_quotes = true;
        } else if ch == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }

    if in_quotes {
        return Err(RosterError::Corrupt(format!(
            "unterminated quoted field in row: {:?}",
            row
        )));
    }

    fields.push(current);
    Ok(fields)
}

/// Split file content into logical rows
///
/// Line breaks inside quoted fields belong to the field; only unquoted line
/// breaks separate rows. The final row may lack a trailing line break.
pub fn split_rows(content: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in content.chars() {
        match ch {
            QUOTE => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '\n' if !in_quotes => {
                // Tolerate CRLF row endings
                if current.ends_with('\r') {
                    current.pop();
                }
                rows.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        rows.push(current);
    }
    rows
}
