//! Turning resize and crop requests into `convert` argument lists.
//!
//! `convert` applies settings in the order they appear, so the position of every
//! flag below is part of the contract with the tool.

use crate::config::ms_to_duration;
use crate::error::ImageMagickError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FORMAT: &str = "jpg";
pub const DEFAULT_QUALITY: f64 = 0.8;
pub const DEFAULT_FILTER: &str = "Lagrange";
pub const DEFAULT_SHARPENING: f64 = 0.2;

/// Everything a resize or crop request can specify.
///
/// A width or height of `0` means "derive from the aspect ratio". Unknown keys
/// are rejected when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ResizeOptions {
    pub src_path: Option<PathBuf>,
    /// Encoded source image, streamed to `convert` on stdin.
    #[serde(skip)]
    pub src_data: Option<Vec<u8>>,
    /// Format hint for `src_data`, e.g. `png` (becomes `png:-`).
    pub src_format: Option<String>,
    /// Output file. Without it the image is written to stdout.
    pub dst_path: Option<PathBuf>,
    /// Output quality in `(0, 1]`.
    pub quality: f64,
    pub format: String,
    /// Plane-interlaced (progressive) JPEG.
    pub progressive: bool,
    pub colorspace: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Remove profiles and comments.
    pub strip: bool,
    /// Resampling filter.
    pub filter: Option<String>,
    /// Sharpening amount; the blur factor passed on is `1.0 - sharpening`.
    pub sharpening: f64,
    /// Appended verbatim right before the destination.
    pub custom_args: Vec<String>,
    /// Milliseconds before `convert` is killed. `0` uses the configured default.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            src_path: None,
            src_data: None,
            src_format: None,
            dst_path: None,
            quality: DEFAULT_QUALITY,
            format: DEFAULT_FORMAT.to_string(),
            progressive: false,
            colorspace: None,
            width: 0,
            height: 0,
            strip: true,
            filter: Some(DEFAULT_FILTER.to_string()),
            sharpening: DEFAULT_SHARPENING,
            custom_args: Vec::new(),
            timeout_ms: 0,
        }
    }
}

impl ResizeOptions {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            src_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            src_data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Parses options from JSON, reporting the path of the first offending field.
    pub fn from_json(json: &str) -> Result<Self, ImageMagickError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        Ok(serde_path_to_error::deserialize(deserializer)?)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.dst_path = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        ms_to_duration(self.timeout_ms)
    }

    fn source_path(&self) -> Option<&PathBuf> {
        self.src_path.as_ref().filter(|p| !p.as_os_str().is_empty())
    }
}

/// A validated `convert` argument list together with the values it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeCommand {
    pub args: Vec<String>,
    /// Source token, `-` or `<format>:-` when reading stdin.
    pub source: String,
    /// Destination token, `<format>:-` when writing stdout.
    pub destination: String,
    pub width: u32,
    pub height: u32,
}

impl ResizeCommand {
    /// Whether `convert` expects the source image on stdin.
    pub fn reads_stdin(&self) -> bool {
        self.source.ends_with('-')
    }

    /// Whether the converted image arrives on stdout.
    pub fn writes_stdout(&self) -> bool {
        self.destination.ends_with('-')
    }
}

/// Resize geometry: `W`, `xH` or `WxH`.
pub fn resize_geometry(width: u32, height: u32) -> String {
    match (width, height) {
        (w, 0) => w.to_string(),
        (0, h) => format!("x{}", h),
        (w, h) => format!("{}x{}", w, h),
    }
}

/// Builds the `convert` arguments for a resize. Fails before anything runs if the
/// options are unusable.
pub fn resize_args(options: &ResizeOptions) -> Result<ResizeCommand, ImageMagickError> {
    let source_path = options.source_path();
    if source_path.is_none() && options.src_data.is_none() {
        return Err(ImageMagickError::Validation(
            "both srcPath and srcData are empty".to_string(),
        ));
    }
    if options.width == 0 && options.height == 0 {
        return Err(ImageMagickError::Validation(
            "both width and height can not be 0 (zero)".to_string(),
        ));
    }

    let format = if options.format.is_empty() {
        DEFAULT_FORMAT
    } else {
        options.format.as_str()
    };
    let source = match (source_path, options.src_format.as_deref()) {
        (Some(path), _) => path.to_string_lossy().into_owned(),
        (None, Some(hint)) if !hint.is_empty() => format!("{}:-", hint),
        (None, _) => "-".to_string(),
    };
    let destination = match &options.dst_path {
        Some(path) if !path.as_os_str().is_empty() => path.to_string_lossy().into_owned(),
        _ => format!("{}:-", format),
    };

    let mut args = vec![source.clone()];
    if options.sharpening > 0.0 {
        args.push("-set".to_string());
        args.push("option:filter:blur".to_string());
        args.push((1.0 - options.sharpening).to_string());
    }
    if let Some(filter) = options.filter.as_deref().filter(|f| !f.is_empty()) {
        args.push("-filter".to_string());
        args.push(filter.to_string());
    }
    if options.strip {
        args.push("-strip".to_string());
    }
    args.push("-resize".to_string());
    args.push(resize_geometry(options.width, options.height));

    let format = format.to_lowercase();
    let is_jpeg = format == "jpg" || format == "jpeg";
    if is_jpeg && options.progressive {
        args.push("-interlace".to_string());
        args.push("plane".to_string());
    }
    if is_jpeg || format == "png" {
        args.push("-quality".to_string());
        args.push(scaled_quality(options.quality, 100.0));
    } else if format == "miff" || format == "mif" {
        args.push("-quality".to_string());
        args.push(scaled_quality(options.quality, 9.0));
    }
    if let Some(colorspace) = options.colorspace.as_deref().filter(|c| !c.is_empty()) {
        args.push("-colorspace".to_string());
        args.push(colorspace.to_string());
    }
    args.extend(options.custom_args.iter().cloned());
    args.push(destination.clone());

    Ok(ResizeCommand {
        args,
        source,
        destination,
        width: options.width,
        height: options.height,
    })
}

fn scaled_quality(quality: f64, scale: f64) -> String {
    ((quality * scale).round() as i64).to_string()
}

/// Validates a crop request and builds the resize command it starts from.
pub fn crop_command(options: &ResizeOptions) -> Result<ResizeCommand, ImageMagickError> {
    let has_destination = options
        .dst_path
        .as_ref()
        .is_some_and(|p| !p.as_os_str().is_empty());
    if !has_destination {
        return Err(ImageMagickError::Validation("No dstPath defined".to_string()));
    }
    if options.width == 0 && options.height == 0 {
        return Err(ImageMagickError::Validation(
            "No width or height defined".to_string(),
        ));
    }
    resize_args(options)
}

/// Rewrites a resize command into a fill-then-center-crop command.
///
/// Every `-resize <geometry>` pair is replaced by a resize that covers the target
/// box (matching width when the source is relatively narrower, height otherwise),
/// followed by a centered crop to exactly `width`x`height` and `+repage`.
pub fn crop_args(command: &ResizeCommand, source_width: u32, source_height: u32) -> Vec<String> {
    let (width, height) = (command.width, command.height);
    let source_aspect = f64::from(source_width) / f64::from(source_height);
    let target_aspect = f64::from(width) / f64::from(height);
    let cover = if source_aspect < target_aspect {
        format!("{}x", width)
    } else {
        format!("x{}", height)
    };

    let mut args = Vec::with_capacity(command.args.len() + 6);
    let mut iter = command.args.iter();
    while let Some(arg) = iter.next() {
        if arg != "-resize" {
            args.push(arg.clone());
            continue;
        }
        // Drop the original geometry.
        iter.next();
        args.extend([
            "-resize".to_string(),
            cover.clone(),
            "-gravity".to_string(),
            "Center".to_string(),
            "-crop".to_string(),
            format!("{}x{}+0+0", width, height),
            "+repage".to_string(),
        ]);
    }
    args
}
