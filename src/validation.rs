//! Standalone TAMS field validators (C8). These are pure functions — no
//! suspension points — so repositories and handlers can call them inline
//! before any I/O is attempted.

use crate::error::{validation_error, TamsError};
use crate::time_range::TimeRange;
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static uuid regex is valid")
});

static MIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z0-9][\\w.+-]*/[a-zA-Z0-9][\\w.+-]*$").expect("static mime regex is valid"));

const VALID_CONTENT_FORMATS: &[&str] = &[
    "urn:x-nmos:format:video",
    "urn:x-nmos:format:audio",
    "urn:x-nmos:format:data",
    "urn:x-tam:format:image",
    "urn:x-nmos:format:multi",
];

pub fn validate_uuid(value: &str) -> Result<(), TamsError> {
    if UUID_RE.is_match(value) {
        Ok(())
    } else {
        Err(validation_error(format!("'{value}' is not a valid UUID")))
    }
}

/// RFC-3339 timestamp, as the teacher parses with `chrono` elsewhere.
pub fn validate_timestamp(value: &str) -> Result<(), TamsError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| validation_error(format!("invalid timestamp '{value}': {e}")))
}

pub fn validate_content_format(value: &str) -> Result<(), TamsError> {
    if VALID_CONTENT_FORMATS.contains(&value) {
        Ok(())
    } else {
        Err(validation_error(format!(
            "'{value}' is not a recognized content format; expected one of {VALID_CONTENT_FORMATS:?}"
        )))
    }
}

pub fn validate_mime_type(value: &str) -> Result<(), TamsError> {
    if MIME_RE.is_match(value) {
        Ok(())
    } else {
        Err(validation_error(format!("'{value}' is not a valid MIME type")))
    }
}

/// Delegates to the C5 time-range grammar; kept here so every validator in
/// the taxonomy is reachable from one module.
pub fn validate_timerange(value: &str) -> Result<TimeRange, TamsError> {
    TimeRange::parse(value)
}

pub fn validate_label(value: &str) -> Result<(), TamsError> {
    if value.len() > 256 {
        return Err(validation_error("label must be 256 characters or fewer"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }

    #[test]
    fn rejects_malformed_uuid() {
        assert!(validate_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn accepts_rfc3339_timestamp() {
        assert!(validate_timestamp("2024-01-01T00:00:00Z").is_ok());
    }

    #[test]
    fn rejects_bad_timestamp() {
        assert!(validate_timestamp("not a date").is_err());
    }

    #[test]
    fn only_known_content_formats_are_valid() {
        assert!(validate_content_format("urn:x-nmos:format:video").is_ok());
        assert!(validate_content_format("urn:x-custom:format:thing").is_err());
    }

    #[test]
    fn mime_grammar_requires_a_slash() {
        assert!(validate_mime_type("video/mp4").is_ok());
        assert!(validate_mime_type("video").is_err());
    }

    #[test]
    fn label_length_is_bounded() {
        assert!(validate_label("short").is_ok());
        assert!(validate_label(&"x".repeat(300)).is_err());
    }
}
