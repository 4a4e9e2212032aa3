//! Parsers for the text `identify` prints.

mod datetime;
pub mod dimensions;
pub mod exif;

pub use datetime::parse_exif_datetime;
pub use dimensions::{parse_identify, ImageMetadata, IDENTIFY_FORMAT};
pub use exif::{exif_key_name, parse_exif, ExifRecord, ExifValue, DEFAULT_NAMESPACE, EXIF_FORMAT};
