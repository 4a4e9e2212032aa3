use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageMagickError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid options: {0}")]
    Validation(String),

    #[error("Invalid options at path '{path}': {source}")]
    InvalidOptions {
        path: String,
        source: serde_json::Error,
    },

    #[error("Could not start '{program}': {source}")]
    ProgramNotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("Process exited with {}. stderr={stderr}. command={command_args}", exit_description(.code))]
    NonZeroExit {
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: String,
        command_args: String,
    },

    #[error("Process timed out after {timeout:?}. command={command_args}")]
    Timeout {
        timeout: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        command_args: String,
    },

    #[error("Expected different output format from identify. output={output:?}, command={command_args}")]
    UnexpectedFormat {
        output: String,
        command_args: String,
    },

    #[error("identify reported no usable dimensions for {image}")]
    MissingDimensions { image: String },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ImageMagickError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ImageMagickError::InvalidOptions {
            path: err.path().to_string(),
            source: err.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_message_includes_code_and_stderr() {
        let err = ImageMagickError::NonZeroExit {
            code: Some(1),
            stdout: Vec::new(),
            stderr: "convert: unable to open image".to_string(),
            command_args: "convert missing.jpg jpg:-".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 1"));
        assert!(msg.contains("unable to open image"));
        assert!(msg.contains("convert missing.jpg jpg:-"));
    }

    #[test]
    fn signal_exit_is_described() {
        let err = ImageMagickError::NonZeroExit {
            code: None,
            stdout: Vec::new(),
            stderr: String::new(),
            command_args: "identify -".to_string(),
        };
        assert!(err.to_string().contains("a signal"));
    }
}
