use crate::parse::datetime::parse_exif_datetime;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `identify -format` string dumping every EXIF property as `exif:Key=Value` lines.
pub const EXIF_FORMAT: &str = "%[EXIF:*]";

/// Namespace for keys printed without a `prefix:`.
pub const DEFAULT_NAMESPACE: &str = "default";

const EXIF_NAMESPACE: &str = "exif";

/// A single EXIF value, converted when the field is known to hold a number or date.
///
/// Serialized without a tag: integers as JSON numbers, dates as RFC 3339 strings and
/// text as plain strings. Reading JSON back picks the first variant that fits, so a
/// `Text` value that itself looks like an RFC 3339 timestamp comes back as `DateTime`.
/// The JSON form is meant for output; keep the [`ExifRecord`] itself when values must
/// survive unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExifValue {
    Integer(i64),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl ExifValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ExifValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ExifValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExifValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// EXIF properties grouped by namespace (`exif`, `default`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExifRecord {
    namespaces: BTreeMap<String, BTreeMap<String, ExifValue>>,
}

impl ExifRecord {
    pub fn get(&self, namespace: &str, key: &str) -> Option<&ExifValue> {
        self.namespaces.get(namespace)?.get(key)
    }

    /// Shorthand for `get("exif", key)`.
    pub fn exif(&self, key: &str) -> Option<&ExifValue> {
        self.get(EXIF_NAMESPACE, key)
    }

    pub fn namespace(&self, namespace: &str) -> Option<&BTreeMap<String, ExifValue>> {
        self.namespaces.get(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    fn insert(&mut self, namespace: &str, key: String, value: ExifValue) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Converter {
    Integer,
    Date,
}

/// Fields in the `exif` namespace that get a typed value. Keys are post-rename.
fn converter_for(key: &str) -> Option<Converter> {
    match key {
        "bitsPerSample"
        | "compression"
        | "exifImageLength"
        | "exifImageWidth"
        | "exifOffset"
        | "exposureProgram"
        | "flash"
        | "imageLength"
        | "imageWidth"
        | "isoSpeedRatings"
        | "jpegInterchangeFormat"
        | "jpegInterchangeFormatLength"
        | "lightSource"
        | "meteringMode"
        | "orientation"
        | "photometricInterpretation"
        | "planarConfiguration"
        | "resolutionUnit"
        | "rowsPerStrip"
        | "samplesPerPixel"
        | "sensingMethod"
        | "stripByteCounts"
        | "subSecTime"
        | "subSecTimeDigitized"
        | "subSecTimeOriginal"
        | "customRendered"
        | "exposureMode"
        | "focalLengthIn35mmFilm"
        | "gainControl"
        | "saturation"
        | "sharpness"
        | "subjectDistanceRange"
        | "whiteBalance"
        | "sceneCaptureType" => Some(Converter::Integer),
        "dateTime" | "dateTimeDigitized" | "dateTimeOriginal" => Some(Converter::Date),
        _ => None,
    }
}

fn convert_value(key: &str, raw: &str) -> ExifValue {
    let converted = match converter_for(key) {
        Some(Converter::Integer) => raw.parse().ok().map(ExifValue::Integer),
        Some(Converter::Date) => parse_exif_datetime(raw).map(ExifValue::DateTime),
        None => return ExifValue::Text(raw.to_string()),
    };
    converted.unwrap_or_else(|| {
        debug!("Keeping unconvertible EXIF value {}={:?} as text", key, raw);
        ExifValue::Text(raw.to_string())
    })
}

/// Renames an ImageMagick EXIF key to camelCase.
///
/// The leading run of ASCII uppercase letters is lowercased. When the run is
/// longer than one letter, its last letter starts the next word and stays
/// uppercase: `DateTime` → `dateTime`, `ISOSpeedRatings` → `isoSpeedRatings`.
/// An all-caps key keeps its final letter: `ISO` → `isO`.
pub fn exif_key_name(key: &str) -> String {
    let run = key.bytes().take_while(u8::is_ascii_uppercase).count();
    let lowered = match run {
        0 => return key.to_string(),
        1 => 1,
        n => n - 1,
    };
    let (head, tail) = key.split_at(lowered);
    let mut name = head.to_ascii_lowercase();
    name.push_str(tail);
    name
}

/// Parses `identify -format "%[EXIF:*]"` output.
///
/// Each `namespace:Key=Value` line becomes one entry. Lines without `=` are
/// skipped, keys without a namespace land in [`DEFAULT_NAMESPACE`]. Only keys in
/// the `exif` namespace are renamed and converted.
pub fn parse_exif(output: &str) -> ExifRecord {
    let mut record = ExifRecord::default();

    for line in output.split('\n') {
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = raw_key.replacen('/', "-", 1);
        let value = raw_value.trim();

        match key.split_once(':') {
            Some((EXIF_NAMESPACE, bare)) => {
                let name = exif_key_name(bare);
                let converted = convert_value(&name, value);
                record.insert(EXIF_NAMESPACE, name, converted);
            }
            Some((namespace, bare)) => {
                record.insert(namespace, bare.to_string(), ExifValue::Text(value.to_string()));
            }
            None => {
                record.insert(DEFAULT_NAMESPACE, key, ExifValue::Text(value.to_string()));
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    const SAMPLE: &str = "exif:ApertureValue=4281/1441
exif:ColorSpace=1
exif:DateTime=2020:01:15 10:30:00
exif:DateTimeOriginal=2019:12:24 18:05:31
exif:ExifImageLength=3024
exif:ExifImageWidth=4032
exif:ISOSpeedRatings=125
exif:Make=Apple
exif:Model=iPhone 11
exif:Orientation=6
exif:SubSecTimeOriginal=058
exif:thumbnail:JPEGInterchangeFormat=2212
";

    #[test]
    fn test_exif_key_name() {
        assert_eq!(exif_key_name("Orientation"), "orientation");
        assert_eq!(exif_key_name("DateTimeOriginal"), "dateTimeOriginal");
        assert_eq!(exif_key_name("ISOSpeedRatings"), "isoSpeedRatings");
        assert_eq!(exif_key_name("JPEGInterchangeFormat"), "jpegInterchangeFormat");
        assert_eq!(exif_key_name("FNumber"), "fNumber");
        assert_eq!(exif_key_name("YCbCrPositioning"), "yCbCrPositioning");
        assert_eq!(exif_key_name("make"), "make");
        assert_eq!(exif_key_name(""), "");
    }

    #[test]
    fn test_all_caps_key_keeps_last_letter() {
        assert_eq!(exif_key_name("ISO"), "isO");
        assert_eq!(exif_key_name("X"), "x");
    }

    #[test]
    fn test_parse_sample() {
        let record = parse_exif(SAMPLE);

        assert_eq!(record.exif("orientation"), Some(&ExifValue::Integer(6)));
        assert_eq!(record.exif("exifImageWidth").and_then(ExifValue::as_i64), Some(4032));
        assert_eq!(record.exif("isoSpeedRatings").and_then(ExifValue::as_i64), Some(125));
        assert_eq!(record.exif("subSecTimeOriginal").and_then(ExifValue::as_i64), Some(58));
        assert_eq!(record.exif("make").and_then(ExifValue::as_str), Some("Apple"));
        assert_eq!(record.exif("model").and_then(ExifValue::as_str), Some("iPhone 11"));
        assert_eq!(
            record.exif("apertureValue").and_then(ExifValue::as_str),
            Some("4281/1441")
        );
        assert_eq!(
            record.exif("dateTime").and_then(ExifValue::as_datetime),
            Utc.with_ymd_and_hms(2020, 1, 15, 10, 30, 0).single()
        );
    }

    #[test]
    fn test_only_first_colon_splits_namespace() {
        let record = parse_exif(SAMPLE);
        // "thumbnail:JPEGInterchangeFormat" starts with "t", so nothing is lowercased.
        assert_eq!(
            record.exif("thumbnail:JPEGInterchangeFormat").and_then(ExifValue::as_str),
            Some("2212")
        );
    }

    #[test]
    fn test_namespaces_are_separate_records() {
        let record = parse_exif("exif:Orientation=1\nicc:Orientation=raw\nOrientation=plain\n");
        assert_eq!(record.exif("orientation"), Some(&ExifValue::Integer(1)));
        assert_eq!(
            record.get("icc", "Orientation").and_then(ExifValue::as_str),
            Some("raw")
        );
        assert_eq!(
            record.get(DEFAULT_NAMESPACE, "Orientation").and_then(ExifValue::as_str),
            Some("plain")
        );
        assert_eq!(record.namespaces().collect::<Vec<_>>(), vec!["default", "exif", "icc"]);
    }

    #[test]
    fn test_first_key_of_namespace_is_kept() {
        let record = parse_exif("exif:Make=Canon\nexif:Model=EOS R\n");
        let exif = record.namespace("exif").unwrap();
        assert_eq!(exif.len(), 2);
        assert_eq!(exif.get("make").and_then(ExifValue::as_str), Some("Canon"));
    }

    #[test]
    fn test_lines_without_equals_are_ignored() {
        let record = parse_exif("garbage\n\nexif:Flash=16\r\n");
        assert_eq!(record.exif("flash"), Some(&ExifValue::Integer(16)));
        assert_eq!(record.namespaces().count(), 1);
        assert!(parse_exif("no pairs here").is_empty());
    }

    #[test]
    fn test_value_splits_on_first_equals_only() {
        let record = parse_exif("exif:UserComment=a=b\n");
        assert_eq!(record.exif("userComment").and_then(ExifValue::as_str), Some("a=b"));
    }

    #[test]
    fn test_slash_in_key_becomes_dash() {
        let record = parse_exif("exif:Lens/Model=50mm\n");
        assert_eq!(record.exif("lens-Model").and_then(ExifValue::as_str), Some("50mm"));
    }

    #[test]
    fn test_unconvertible_values_stay_text() {
        let record = parse_exif("exif:Orientation=Top-left\nexif:DateTime=    :  :     :  :  \n");
        assert_eq!(record.exif("orientation").and_then(ExifValue::as_str), Some("Top-left"));
        assert!(record.exif("dateTime").and_then(ExifValue::as_str).is_some());
    }

    #[test]
    fn test_serializes_dates_as_rfc3339() {
        let record = parse_exif("exif:DateTimeOriginal=2020:01:15 10:30:00\nexif:Orientation=1\n");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "exif": {"dateTimeOriginal": "2020-01-15T10:30:00Z", "orientation": 1}
            })
        );
    }

    #[test]
    fn test_deserialize_picks_first_matching_variant() {
        let number: ExifValue = serde_json::from_str("125").unwrap();
        assert_eq!(number, ExifValue::Integer(125));

        let digits: ExifValue = serde_json::from_str(r#""125""#).unwrap();
        assert_eq!(digits, ExifValue::Text("125".to_string()));

        // Text shaped like a timestamp reads back as a date.
        let text = ExifValue::Text("2020-01-15T10:30:00Z".to_string());
        let json = serde_json::to_string(&text).unwrap();
        let back: ExifValue = serde_json::from_str(&json).unwrap();
        assert_matches!(back, ExifValue::DateTime(_));
    }
}
