//! Destination phone number normalization
//!
//! Display numbers arrive in whatever format the contact form stored.
//! Sending requires a canonical digit-only form, with a country code
//! prefixed when the number is in local format.

/// Normalize a display number to canonical digit-only form
///
/// Idempotent: normalizing an already-canonical number returns it
/// unchanged. Numbers of local length (10 or 11 digits) that do not
/// already start with the country code get it prefixed; anything longer
/// is assumed to carry one.
#[must_use]
pub fn normalize_destination(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if (digits.len() == 10 || digits.len() == 11) && !digits.starts_with(country_code) {
        format!("{country_code}{digits}")
    } else {
        digits
    }
}
