//! Runs the tesseract binary and collects its output file

use crate::error::{OcrError, ProcessFailure};
use crate::options::RecognitionOptions;
use crate::pending::{output_file, PendingOutputs};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use uuid::Uuid;

/// Extensions tesseract may write, probed in this order. The first match wins.
pub const OUTPUT_EXTENSIONS: [&str; 3] = ["hocr", "html", "txt"];

const PREFIX_STEM: &str = "tesseract-runner-";

/// Invokes tesseract and tracks the temp outputs it has not yet cleaned up
#[derive(Debug, Clone)]
pub struct TesseractRunner {
    temp_dir: PathBuf,
    pending: PendingOutputs,
}

impl Default for TesseractRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractRunner {
    /// Runner writing outputs to the system temp directory
    pub fn new() -> Self {
        Self::with_temp_dir(std::env::temp_dir())
    }

    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            pending: PendingOutputs::new(),
        }
    }

    /// Use an existing registry, e.g. one shared with other runners
    pub fn with_pending(mut self, pending: PendingOutputs) -> Self {
        self.pending = pending;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn pending(&self) -> &PendingOutputs {
        &self.pending
    }

    /// Recognize the text in `image`
    ///
    /// The image path is handed to tesseract as is; a missing file shows up
    /// as `ExternalProcessError`. If the process or the output lookup fails
    /// the prefix stays pending until [`TesseractRunner::shutdown`].
    pub async fn recognize(
        &self,
        image: impl AsRef<Path>,
        options: &RecognitionOptions,
    ) -> Result<String, OcrError> {
        let image = image.as_ref();
        let prefix = self.allocate_prefix();
        self.pending.register(&prefix);

        self.run(image, &prefix, options).await?;

        let output = find_output(&prefix)
            .await
            .ok_or_else(|| OcrError::OutputNotFoundError {
                prefix: prefix.clone(),
            })?;

        let text = self.claim_output(&prefix, &output).await?;

        tracing::debug!(
            "Recognized {} chars from {} via {}",
            text.len(),
            image.display(),
            output.display()
        );

        Ok(text)
    }

    /// Read the output, release its prefix and delete the file
    async fn claim_output(&self, prefix: &Path, output: &Path) -> Result<String, OcrError> {
        let bytes = tokio::fs::read(output)
            .await
            .map_err(|source| OcrError::OutputReadError {
                path: output.to_path_buf(),
                source,
            })?;

        // Invalid sequences become U+FFFD instead of failing the call
        let text = String::from_utf8_lossy(&bytes).into_owned();

        self.finish_output(prefix, output, text).await
    }

    async fn finish_output(
        &self,
        prefix: &Path,
        output: &Path,
        text: String,
    ) -> Result<String, OcrError> {
        self.pending.release(prefix);

        // Cleanup failure is reported instead of the text, never after it
        tokio::fs::remove_file(output)
            .await
            .map_err(|source| OcrError::OutputCleanupError {
                path: output.to_path_buf(),
                source,
            })?;

        Ok(text)
    }

    /// Sweep outputs of calls that never completed
    ///
    /// Call once during graceful termination. Returns how many prefixes were
    /// still pending.
    pub fn shutdown(&self) -> usize {
        let swept = self.pending.sweep();
        if swept > 0 {
            tracing::info!("Swept {} pending tesseract output(s)", swept);
        }
        swept
    }

    fn allocate_prefix(&self) -> PathBuf {
        self.temp_dir
            .join(format!("{}{}", PREFIX_STEM, Uuid::new_v4()))
    }

    async fn run(
        &self,
        image: &Path,
        prefix: &Path,
        options: &RecognitionOptions,
    ) -> Result<(), OcrError> {
        let args = options.command_args(image, prefix);
        tracing::debug!("Running {} {:?}", options.binary_path, args);

        let mut command = Command::new(&options.binary_path);
        command
            .args(&args)
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("{} timed out after {:?}", options.binary_path, limit);
                    return Err(process_error(options, ProcessFailure::TimedOut(limit)));
                }
            },
            None => command.output().await,
        }
        .map_err(|e| process_error(options, ProcessFailure::Spawn(e)))?;

        check_exit(options, output)
    }
}

fn check_exit(options: &RecognitionOptions, output: Output) -> Result<(), OcrError> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        if !stderr.is_empty() {
            tracing::debug!("{} stderr: {}", options.binary_path, stderr);
        }
        return Ok(());
    }

    tracing::warn!(
        "{} exited with {:?}: {}",
        options.binary_path,
        output.status.code(),
        stderr
    );
    Err(process_error(
        options,
        ProcessFailure::Exit {
            code: output.status.code(),
            stderr,
        },
    ))
}

fn process_error(options: &RecognitionOptions, failure: ProcessFailure) -> OcrError {
    OcrError::ExternalProcessError {
        binary: options.binary_path.clone(),
        failure,
    }
}

/// First existing `<prefix>.<ext>` in [`OUTPUT_EXTENSIONS`] order
async fn find_output(prefix: &Path) -> Option<PathBuf> {
    for extension in OUTPUT_EXTENSIONS {
        let candidate = output_file(prefix, extension);
        if let Ok(metadata) = tokio::fs::metadata(&candidate).await {
            if metadata.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_unique_and_extensionless() {
        let runner = TesseractRunner::with_temp_dir("/tmp");
        let a = runner.allocate_prefix();
        let b = runner.allocate_prefix();

        assert_ne!(a, b);
        assert!(a.starts_with("/tmp"));
        assert!(a.extension().is_none());
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PREFIX_STEM));
    }

    #[test]
    fn test_extension_probe_order_is_lexical() {
        let mut sorted = OUTPUT_EXTENSIONS;
        sorted.sort_unstable();
        assert_eq!(sorted, OUTPUT_EXTENSIONS);
    }

    #[tokio::test]
    async fn test_find_output_prefers_first_extension() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("page");
        std::fs::write(output_file(&prefix, "txt"), "plain").unwrap();
        std::fs::write(output_file(&prefix, "html"), "<p>html</p>").unwrap();

        assert_eq!(
            find_output(&prefix).await,
            Some(output_file(&prefix, "html"))
        );
    }

    #[tokio::test]
    async fn test_find_output_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("page");
        std::fs::create_dir(output_file(&prefix, "hocr")).unwrap();

        assert_eq!(find_output(&prefix).await, None);
    }

    #[tokio::test]
    async fn test_claim_output_decodes_lossily_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TesseractRunner::with_temp_dir(dir.path());
        let prefix = dir.path().join("page");
        let output = output_file(&prefix, "txt");
        std::fs::write(&output, b"ok \xff").unwrap();
        runner.pending().register(&prefix);

        let text = runner.claim_output(&prefix, &output).await.unwrap();

        assert_eq!(text, "ok \u{FFFD}");
        assert!(!output.exists());
        assert!(runner.pending().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_fatal_and_releases_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TesseractRunner::with_temp_dir(dir.path());
        let prefix = dir.path().join("page");
        // Output vanished after it was read
        let output = output_file(&prefix, "txt");
        runner.pending().register(&prefix);

        let err = runner
            .finish_output(&prefix, &output, "recognized".to_string())
            .await
            .unwrap_err();

        match err {
            OcrError::OutputCleanupError { path, source } => {
                assert_eq!(path, output);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!runner.pending().contains(&prefix));
        assert_eq!(runner.shutdown(), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_keeps_prefix_pending() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TesseractRunner::with_temp_dir(dir.path());
        let options =
            RecognitionOptions::default().with_binary_path("definitely-not-a-real-tesseract-binary");

        let err = runner.recognize("page.png", &options).await.unwrap_err();

        assert!(matches!(
            err,
            OcrError::ExternalProcessError {
                failure: ProcessFailure::Spawn(_),
                ..
            }
        ));
        assert_eq!(runner.pending().len(), 1);
        assert_eq!(runner.shutdown(), 1);
        assert!(runner.pending().is_empty());
    }
}
