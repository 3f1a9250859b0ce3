//! Field validators and input sanitizer
//!
//! Pure functions, no I/O. The store itself only calls [`sanitize`] and
//! [`is_valid_student_code`] when re-checking code uniqueness under lock;
//! the remaining validators exist for front-ends to run before handing
//! fields to `create`/`update`.

/// Trim surrounding whitespace and strip control characters
pub fn sanitize(input: &str) -> String {
    input.trim().chars().filter(|c| !c.is_control()).collect()
}

/// Student codes are 8 to 10 ASCII digits
pub fn is_valid_student_code(code: &str) -> bool {
    (8..=10).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

/// Minimal shape check: one `@` with a dotted domain after it
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(|c| c.is_whitespace())
}

/// Phone numbers: digits with optional leading `+`, separators allowed
pub fn is_valid_phone(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(7..=15).contains(&digits.len()) {
        return false;
    }
    phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || " -()".contains(c) || (c == '+' && i == 0))
}

/// GPA is in [0, 20] with at most two fractional digits
pub fn is_valid_gpa(gpa: f64) -> bool {
    if !gpa.is_finite() || !(0.0..=20.0).contains(&gpa) {
        return false;
    }
    // Two fractional digits at most
    let scaled = gpa * 100.0;
    (scaled - scaled.round()).abs() < 1e-6
}
