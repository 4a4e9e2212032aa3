use imagemagick::{ImageMagick, ImageMagickError};
use std::path::Path;

const IMAGE_PATH: &str = "data/image.jpg";

fn main() -> Result<(), ImageMagickError> {
    let magick = ImageMagick::new();

    // 1. From a file
    let meta = magick.identify(Path::new(IMAGE_PATH))?;
    println!("{:?}", meta); // ImageMetadata { format: "JPEG", width: Some(2688), ... }

    // 2. From bytes already in memory (piped to identify on stdin)
    let bytes = std::fs::read(IMAGE_PATH)?;
    let meta = magick.identify_data(&bytes)?;
    if let Some((w, h)) = meta.dimensions() {
        println!("{}x{}, quality {:?}", w, h, meta.quality);
    }

    // 3. Any other format escape
    let colors = magick.identify_raw(&["-format", "%k", IMAGE_PATH], None)?;
    println!("Unique colors: {}", colors);

    Ok(())
}
