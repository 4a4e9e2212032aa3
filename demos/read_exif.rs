use imagemagick::{ExifValue, ImageMagick, ImageMagickError};
use std::path::Path;

const IMAGE_PATH: &str = "data/image.jpg";

fn main() -> Result<(), ImageMagickError> {
    let magick = ImageMagick::new();
    let record = magick.read_metadata(Path::new(IMAGE_PATH))?;

    // Typed access
    if let Some(taken) = record.exif("dateTimeOriginal").and_then(ExifValue::as_datetime) {
        println!("Taken at {}", taken);
    }
    if let Some(orientation) = record.exif("orientation").and_then(ExifValue::as_i64) {
        println!("Orientation: {}", orientation);
    }

    // Everything, as JSON
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
