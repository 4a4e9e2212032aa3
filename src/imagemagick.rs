use crate::config::Config;
use crate::error::ImageMagickError;
use crate::options::{crop_args, crop_command, resize_args, ResizeCommand, ResizeOptions};
use crate::parse::{parse_exif, parse_identify, ExifRecord, ImageMetadata, EXIF_FORMAT, IDENTIFY_FORMAT};
use crate::process::{Invocation, InvocationResult, ProcessRunner};
use log::warn;
use std::path::Path;
use std::time::Duration;

/// Entry point for running ImageMagick's `identify` and `convert`.
///
/// Every call starts a fresh process; nothing is kept between calls, so one
/// value can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    config: Config,
    runner: ProcessRunner,
}

impl Default for ImageMagick {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl ImageMagick {
    /// Uses `identify` and `convert` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        let runner = ProcessRunner::from_config(&config);
        Self { config, runner }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- identify ---

    /// Runs `identify` with custom arguments and returns its stdout.
    ///
    /// Bytes that are not valid UTF-8, such as Latin-1 text in EXIF strings,
    /// decode to U+FFFD.
    ///
    /// `input` is piped to stdin; reference it with a `-` source argument.
    ///
    /// # Example
    /// ```no_run
    /// # use imagemagick::{ImageMagick, ImageMagickError};
    /// # fn main() -> Result<(), ImageMagickError> {
    /// let magick = ImageMagick::new();
    /// let colors = magick.identify_raw(&["-format", "%k", "photo.jpg"], None)?;
    /// println!("unique colors: {}", colors);
    /// # Ok(())
    /// # }
    /// ```
    pub fn identify_raw<S: AsRef<str>>(
        &self,
        args: &[S],
        input: Option<&[u8]>,
    ) -> Result<String, ImageMagickError> {
        let result = self.run_identify(args, input)?;
        Ok(result.stdout_text())
    }

    fn run_identify<S: AsRef<str>>(
        &self,
        args: &[S],
        input: Option<&[u8]>,
    ) -> Result<InvocationResult, ImageMagickError> {
        let mut invocation = Invocation::new(self.config.identify_path.clone())
            .args(self.config.identify_args.iter().cloned())
            .args(args.iter().map(|a| a.as_ref().to_string()))
            .timeout_opt(self.config.identify_timeout());
        if let Some(data) = input {
            invocation = invocation.input(data);
        }

        let result = self.runner.run(invocation)?.into_success()?;
        log_stderr_warnings(&result);
        Ok(result)
    }

    /// Reads format, dimensions, depth and quality of an image file.
    ///
    /// Runs `identify -format "%m %w %h %z %Q" {path}`.
    pub fn identify(&self, path: &Path) -> Result<ImageMetadata, ImageMagickError> {
        self.identify_source(&path.to_string_lossy(), None)
    }

    /// Like [`identify`](Self::identify) for an encoded image held in memory.
    pub fn identify_data(&self, data: &[u8]) -> Result<ImageMetadata, ImageMagickError> {
        self.identify_source("-", Some(data))
    }

    fn identify_source(
        &self,
        source: &str,
        input: Option<&[u8]>,
    ) -> Result<ImageMetadata, ImageMagickError> {
        let result = self.run_identify(&["-format", IDENTIFY_FORMAT, source], input)?;
        let output = result.stdout_text();
        parse_identify(&output).ok_or_else(|| ImageMagickError::UnexpectedFormat {
            output,
            command_args: result.command_line().to_string(),
        })
    }

    /// Reads the EXIF properties of an image file.
    ///
    /// Runs `identify -format "%[EXIF:*]" {path}`. Keys in the `exif` namespace are
    /// camelCased and well-known numeric and date fields are converted.
    ///
    /// # Example
    /// ```no_run
    /// # use imagemagick::{ImageMagick, ImageMagickError};
    /// # use std::path::Path;
    /// # fn main() -> Result<(), ImageMagickError> {
    /// let magick = ImageMagick::new();
    /// let exif = magick.read_metadata(Path::new("photo.jpg"))?;
    /// if let Some(orientation) = exif.exif("orientation").and_then(|v| v.as_i64()) {
    ///     println!("orientation: {}", orientation);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_metadata(&self, path: &Path) -> Result<ExifRecord, ImageMagickError> {
        let path_str = path.to_string_lossy();
        let output = self.identify_raw(&["-format", EXIF_FORMAT, &*path_str], None)?;
        Ok(parse_exif(&output))
    }

    // --- convert ---

    /// Runs `convert` with the given arguments.
    ///
    /// A non-zero exit is returned as a normal result; use
    /// [`InvocationResult::into_success`] to treat it as an error. Without a
    /// `timeout` the configured convert timeout applies.
    pub fn convert<S: AsRef<str>>(
        &self,
        args: &[S],
        input: Option<Vec<u8>>,
        timeout: Option<Duration>,
    ) -> Result<InvocationResult, ImageMagickError> {
        let mut invocation = Invocation::new(self.config.convert_path.clone())
            .args(self.config.convert_args.iter().cloned())
            .args(args.iter().map(|a| a.as_ref().to_string()))
            .timeout_opt(timeout.or(self.config.convert_timeout()));
        if let Some(data) = input {
            invocation = invocation.input(data);
        }
        self.runner.run(invocation)
    }

    /// Resizes an image.
    ///
    /// Returns the encoded image when no `dst_path` is set, otherwise the image is
    /// written there and the returned bytes are whatever `convert` printed (usually
    /// nothing).
    ///
    /// # Example
    /// ```no_run
    /// # use imagemagick::{ImageMagick, ImageMagickError, ResizeOptions};
    /// # fn main() -> Result<(), ImageMagickError> {
    /// let magick = ImageMagick::new();
    /// let jpeg = magick.resize(&ResizeOptions::from_path("photo.png").with_size(640, 0))?;
    /// std::fs::write("photo-640.jpg", jpeg)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn resize(&self, options: &ResizeOptions) -> Result<Vec<u8>, ImageMagickError> {
        let command = resize_args(options)?;
        self.run_resize(options, &command, command.args.clone())
    }

    /// Resizes to cover `width`x`height` and crops the center to exactly that size.
    ///
    /// Identifies the source first to compare aspect ratios. Requires `dst_path`.
    pub fn crop(&self, options: &ResizeOptions) -> Result<Vec<u8>, ImageMagickError> {
        let command = crop_command(options)?;
        let input = if command.reads_stdin() {
            options.src_data.as_deref()
        } else {
            None
        };

        let source = self.identify_source(&command.source, input)?;
        let (width, height) = source
            .dimensions()
            .ok_or_else(|| ImageMagickError::MissingDimensions {
                image: command.source.clone(),
            })?;

        let args = crop_args(&command, width, height);
        self.run_resize(options, &command, args)
    }

    fn run_resize(
        &self,
        options: &ResizeOptions,
        command: &ResizeCommand,
        args: Vec<String>,
    ) -> Result<Vec<u8>, ImageMagickError> {
        let input = if command.reads_stdin() {
            options.src_data.clone()
        } else {
            None
        };
        let result = self.convert(&args, input, options.timeout())?.into_success()?;
        log_stderr_warnings(&result);
        Ok(result.into_stdout())
    }
}

/// ImageMagick reports recoverable problems on stderr while still exiting 0.
fn log_stderr_warnings(result: &InvocationResult) {
    for line in result.stderr_text().lines().filter(|l| !l.trim().is_empty()) {
        warn!("ImageMagick warning - {} ({})", line, result.command_line());
    }
}
