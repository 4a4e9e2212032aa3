use imagemagick::{ImageMagick, ImageMagickError, ResizeOptions};

const IMAGE_PATH: &str = "data/image.jpg";

fn main() -> Result<(), ImageMagickError> {
    let magick = ImageMagick::new();

    // 1. Resize to 800px wide, progressive JPEG returned as bytes
    let options = ResizeOptions {
        progressive: true,
        quality: 0.85,
        ..ResizeOptions::from_path(IMAGE_PATH).with_size(800, 0)
    };
    let jpeg = magick.resize(&options)?;
    std::fs::write("resized.jpg", &jpeg)?;
    println!("Wrote resized.jpg ({} bytes)", jpeg.len());

    // 2. Resize in-memory data into a PNG
    let options = ResizeOptions {
        src_format: Some("jpg".to_string()),
        ..ResizeOptions::from_data(jpeg)
            .with_size(0, 120)
            .with_format("png")
    };
    let png = magick.resize(&options)?;
    println!("PNG thumbnail: {} bytes", png.len());

    // 3. Square center crop written straight to disk
    magick.crop(
        &ResizeOptions::from_path(IMAGE_PATH)
            .with_size(256, 256)
            .with_destination("square.jpg"),
    )?;
    println!("Wrote square.jpg");

    Ok(())
}
