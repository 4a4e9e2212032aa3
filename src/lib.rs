//! # ImageMagick
//!
//! A Rust wrapper around ImageMagick's `identify` and `convert` command-line tools.
//!
//! Every operation spawns the tool as a child process, feeds it image bytes on
//! stdin when the source is held in memory, and collects stdout and stderr
//! concurrently. Inspection calls parse the text `identify` prints; conversion
//! calls hand back the encoded image bytes.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use imagemagick::{ImageMagick, ImageMagickError, ResizeOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ImageMagickError> {
//!     let magick = ImageMagick::new(); // identify/convert from PATH
//!
//!     // Format, dimensions, depth and quality
//!     let meta = magick.identify(Path::new("photo.jpg"))?;
//!     println!("{} {:?}x{:?}", meta.format, meta.width, meta.height);
//!
//!     // EXIF properties, grouped by namespace
//!     let exif = magick.read_metadata(Path::new("photo.jpg"))?;
//!     println!("taken: {:?}", exif.exif("dateTimeOriginal"));
//!
//!     // Resize to 640px wide, JPEG on stdout
//!     let jpeg = magick.resize(&ResizeOptions::from_path("photo.jpg").with_size(640, 0))?;
//!     println!("{} bytes", jpeg.len());
//!
//!     // Square thumbnail, center-cropped, written to a file
//!     magick.crop(
//!         &ResizeOptions::from_path("photo.jpg")
//!             .with_size(200, 200)
//!             .with_destination("thumb.jpg"),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use imagemagick::{Config, ImageMagick};
//! use std::time::Duration;
//!
//! // ImageMagick 7 ships a single `magick` binary.
//! let config = Config::magick()
//!     .with_convert_timeout(Some(Duration::from_secs(30)))
//!     .with_env("MAGICK_THREAD_LIMIT", "2");
//! let magick = ImageMagick::with_config(config);
//! ```

// Public API
mod config;
mod error;
mod imagemagick;

pub use config::Config;
pub use error::ImageMagickError;
pub use imagemagick::ImageMagick;

pub mod decode;
pub mod options;
pub mod parse;
pub mod process;
pub use options::ResizeOptions;
pub use parse::{ExifRecord, ExifValue, ImageMetadata};
pub use process::{Invocation, InvocationResult, ProcessRunner};

mod utils;
