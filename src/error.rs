use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to run {binary}: {failure}")]
    ExternalProcessError {
        binary: String,
        failure: ProcessFailure,
    },

    #[error("No tesseract output found for {}", .prefix.display())]
    OutputNotFoundError { prefix: PathBuf },

    #[error("Failed to read tesseract output {}: {source}", .path.display())]
    OutputReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove tesseract output {}: {source}", .path.display())]
    OutputCleanupError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why the external process did not complete successfully
#[derive(Error, Debug)]
pub enum ProcessFailure {
    #[error("could not spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("exited with {}: {stderr}", exit_code_label(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl OcrError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            OcrError::ExternalProcessError { .. } => "PROCESS_ERROR",
            OcrError::OutputNotFoundError { .. } => "OUTPUT_NOT_FOUND",
            OcrError::OutputReadError { .. } => "OUTPUT_READ_ERROR",
            OcrError::OutputCleanupError { .. } => "OUTPUT_CLEANUP_ERROR",
        }
    }
}
