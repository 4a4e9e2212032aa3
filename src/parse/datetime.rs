use chrono::{DateTime, NaiveDateTime, Utc};

/// Format ImageMagick prints for EXIF date fields.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Parses an EXIF `YYYY:MM:DD HH:MM:SS` timestamp, interpreting it as UTC.
///
/// EXIF dates carry no offset, so the wall-clock value is taken as-is.
pub fn parse_exif_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
