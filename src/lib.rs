//! Run the `tesseract` command-line tool and collect the recognized text
//!
//! ```no_run
//! use tesseract_runner::{RecognitionOptions, TesseractRunner};
//!
//! # async fn demo() -> Result<(), tesseract_runner::OcrError> {
//! let runner = TesseractRunner::new();
//! let text = runner
//!     .recognize("scan.png", &RecognitionOptions::default().with_language("deu"))
//!     .await?;
//! println!("{}", text);
//!
//! // During graceful termination
//! runner.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod pending;
pub mod runner;

pub use error::{OcrError, ProcessFailure};
pub use options::{
    OptionOverrides, RecognitionOptions, DEFAULT_BINARY, DEFAULT_LANGUAGE,
    DEFAULT_PAGE_SEGMENTATION_MODE,
};
pub use pending::PendingOutputs;
pub use runner::{TesseractRunner, OUTPUT_EXTENSIONS};
