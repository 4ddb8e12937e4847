//! Canonical timestamp handling.
//!
//! Every timestamp that crosses a crate boundary is rendered as
//! `YYYY-MM-DD HH:MM:SS`. User input may also use a bare `YYYY-MM-DD`,
//! which expands to midnight of that day.

use chrono::{NaiveDate, NaiveDateTime, Utc};

/// `strftime` pattern of the canonical representation.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_SHAPE: &str = "dddd-dd-dd dd:dd:dd";
const DATE_SHAPE: &str = "dddd-dd-dd";
const SECONDS_PER_DAY: i64 = 86_400;

/// Raised when user-supplied date text matches neither accepted format.
///
/// # Examples
///
/// ```
/// use certwatch_common::datetime::normalize;
///
/// let err = normalize("01/02/2024").unwrap_err();
/// assert!(err.to_string().contains("YYYY-MM-DD HH:MM:SS"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date '{input}': use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
pub struct FormatError {
    pub input: String,
}

/// Parses user input into a canonical timestamp.
///
/// Empty (or whitespace-only) input means "unset" and yields `Ok(None)`.
///
/// # Examples
///
/// ```
/// use certwatch_common::datetime::{format_canonical, normalize};
///
/// let ts = normalize("2030-01-01").unwrap().unwrap();
/// assert_eq!(format_canonical(&ts), "2030-01-01 00:00:00");
/// assert_eq!(normalize("").unwrap(), None);
/// ```
pub fn normalize(text: &str) -> Result<Option<NaiveDateTime>, FormatError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let invalid = || FormatError {
        input: text.to_string(),
    };

    if matches_shape(text, DATETIME_SHAPE) {
        return NaiveDateTime::parse_from_str(text, CANONICAL_FORMAT)
            .map(Some)
            .map_err(|_| invalid());
    }

    if matches_shape(text, DATE_SHAPE) {
        return NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Some)
            .ok_or_else(invalid);
    }

    Err(invalid())
}

/// Like [`normalize`], but renders the result; "unset" becomes `""`.
pub fn normalize_to_string(text: &str) -> Result<String, FormatError> {
    Ok(normalize(text)?
        .map(|ts| format_canonical(&ts))
        .unwrap_or_default())
}

/// Parses an already-canonical timestamp, as stored in the database.
pub fn parse_canonical(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, CANONICAL_FORMAT).ok()
}

pub fn format_canonical(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// Current wall-clock time in UTC, the reference for every expiry computation.
pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Whole days from `now` until `not_after`, rounded toward negative infinity.
///
/// # Examples
///
/// ```
/// use certwatch_common::datetime::{days_remaining, parse_canonical};
///
/// let now = parse_canonical("2024-01-01 12:00:00").unwrap();
/// let later = parse_canonical("2024-01-11 11:59:59").unwrap();
/// let earlier = parse_canonical("2024-01-01 00:00:00").unwrap();
/// assert_eq!(days_remaining(&later, &now), 9);
/// assert_eq!(days_remaining(&earlier, &now), -1);
/// ```
pub fn days_remaining(not_after: &NaiveDateTime, now: &NaiveDateTime) -> i64 {
    (*not_after - *now)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}

// `d` stands for an ASCII digit, anything else must match literally.
fn matches_shape(text: &str, shape: &str) -> bool {
    text.len() == shape.len()
        && text.bytes().zip(shape.bytes()).all(|(c, s)| match s {
            b'd' => c.is_ascii_digit(),
            _ => c == s,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_timestamp_is_returned_unchanged() {
        let out = normalize_to_string("2024-03-05 06:07:08").unwrap();
        assert_eq!(out, "2024-03-05 06:07:08");
    }

    #[test]
    fn bare_date_expands_to_midnight() {
        let out = normalize_to_string("2024-03-05").unwrap();
        assert_eq!(out, "2024-03-05 00:00:00");
    }

    #[test]
    fn empty_input_is_unset() {
        assert_eq!(normalize("   ").unwrap(), None);
        assert_eq!(normalize_to_string("").unwrap(), "");
    }

    #[test]
    fn rejects_other_shapes() {
        for bad in [
            "2024/03/05",
            "2024-3-5",
            "05-03-2024",
            "2024-03-05T06:07:08",
            "2024-03-05 6:07:08",
            "tomorrow",
        ] {
            let err = normalize(bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn rejects_impossible_calendar_dates() {
        assert!(normalize("2024-02-30").is_err());
        assert!(normalize("2024-13-01 00:00:00").is_err());
        assert!(normalize("2024-01-01 24:00:00").is_err());
    }

    #[test]
    fn days_remaining_floors_partial_days() {
        let now = parse_canonical("2024-06-01 00:00:00").unwrap();
        let cases = [
            ("2024-06-01 00:00:00", 0),
            ("2024-06-01 23:59:59", 0),
            ("2024-06-02 00:00:00", 1),
            ("2024-05-31 23:59:59", -1),
            ("2024-05-31 00:00:00", -1),
            ("2024-05-30 23:59:59", -2),
        ];
        for (not_after, expected) in cases {
            let not_after = parse_canonical(not_after).unwrap();
            assert_eq!(days_remaining(&not_after, &now), expected, "{not_after}");
        }
    }
}
