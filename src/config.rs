use crate::error::ImageMagickError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Identify calls are bounded by default; a hung decoder should not hang the caller.
const DEFAULT_IDENTIFY_TIMEOUT_MS: u64 = 120_000;

/// Where the ImageMagick tools live and how they are run.
///
/// Program paths are resolved through `PATH` unless absolute. For ImageMagick 7,
/// where both tools are subcommands of `magick`, use [`Config::magick`].
///
/// Timeouts are in milliseconds; `0` means no limit. JSON keys are camelCase,
/// like [`ResizeOptions`](crate::ResizeOptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    pub identify_path: PathBuf,
    /// Arguments placed before every identify argument list.
    pub identify_args: Vec<String>,
    pub convert_path: PathBuf,
    /// Arguments placed before every convert argument list.
    pub convert_args: Vec<String>,
    pub identify_timeout_ms: u64,
    /// Used when a resize request does not set its own timeout.
    pub convert_timeout_ms: u64,
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables, e.g. `MAGICK_TMPDIR` or `MAGICK_THREAD_LIMIT`.
    pub envs: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identify_path: PathBuf::from("identify"),
            identify_args: Vec::new(),
            convert_path: PathBuf::from("convert"),
            convert_args: Vec::new(),
            identify_timeout_ms: DEFAULT_IDENTIFY_TIMEOUT_MS,
            convert_timeout_ms: 0,
            current_dir: None,
            envs: BTreeMap::new(),
        }
    }
}

impl Config {
    /// ImageMagick 7 layout: `magick identify ...` and `magick convert ...`.
    pub fn magick() -> Self {
        Self::default()
            .with_identify_program("magick", ["identify"])
            .with_convert_program("magick", ["convert"])
    }

    /// Parses a JSON config. Missing fields keep their defaults; unknown fields are rejected.
    pub fn from_json_str(json: &str) -> Result<Self, ImageMagickError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        Ok(serde_path_to_error::deserialize(deserializer)?)
    }

    pub fn with_identify_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.identify_path = path.into();
        self
    }

    pub fn with_convert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.convert_path = path.into();
        self
    }

    pub fn with_identify_program<I, S>(mut self, path: impl Into<PathBuf>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identify_path = path.into();
        self.identify_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_convert_program<I, S>(mut self, path: impl Into<PathBuf>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.convert_path = path.into();
        self.convert_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_identify_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.identify_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn with_convert_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.convert_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn identify_timeout(&self) -> Option<Duration> {
        ms_to_duration(self.identify_timeout_ms)
    }

    pub fn convert_timeout(&self) -> Option<Duration> {
        ms_to_duration(self.convert_timeout_ms)
    }
}

pub(crate) fn ms_to_duration(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn duration_to_ms(timeout: Option<Duration>) -> u64 {
    timeout
        .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
