//! Recognition options and the override merge policy
//!
//! `RecognitionOptions` is the fully resolved set of settings for one
//! tesseract invocation. `OptionOverrides` is the partial form callers (or
//! HTTP clients) send; merging it onto a base distinguishes a key that is
//! absent (base value kept) from a nullable key sent as `null` (flag omitted).

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_PAGE_SEGMENTATION_MODE: u32 = 3;
pub const DEFAULT_BINARY: &str = "tesseract";

/// Resolved settings for one tesseract run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Passed as `-l <language>` when set (e.g. "eng", "deu+fra")
    pub language: Option<String>,
    /// Passed as `--psm <mode>` when set
    pub page_segmentation_mode: Option<u32>,
    /// Extra tesseract arguments, split on whitespace. Never shell-interpreted.
    pub extra_config: Option<String>,
    /// Program to execute, looked up on PATH when not absolute
    pub binary_path: String,
    /// Variables added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Kill the process and fail if it runs longer than this
    pub timeout: Option<Duration>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: Some(DEFAULT_LANGUAGE.to_string()),
            page_segmentation_mode: Some(DEFAULT_PAGE_SEGMENTATION_MODE),
            extra_config: None,
            binary_path: DEFAULT_BINARY.to_string(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl RecognitionOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_page_segmentation_mode(mut self, mode: u32) -> Self {
        self.page_segmentation_mode = Some(mode);
        self
    }

    pub fn with_extra_config(mut self, config: impl Into<String>) -> Self {
        self.extra_config = Some(config.into());
        self
    }

    pub fn with_binary_path(mut self, binary: impl Into<String>) -> Self {
        self.binary_path = binary.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply overrides on top of these options (shallow merge)
    pub fn merge(mut self, overrides: OptionOverrides) -> Self {
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if let Some(mode) = overrides.page_segmentation_mode {
            self.page_segmentation_mode = mode;
        }
        if let Some(config) = overrides.extra_config {
            self.extra_config = config;
        }
        if let Some(binary) = overrides.binary_path {
            self.binary_path = binary;
        }
        if let Some(env) = overrides.env {
            self.env = env;
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout = Some(Duration::from_millis(ms));
        }
        self
    }

    /// Arguments following the binary: `<image> <prefix> [-l ..] [--psm ..] [extra..]`
    pub fn command_args(&self, image: &Path, output_prefix: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![image.into(), output_prefix.into()];

        if let Some(language) = &self.language {
            args.push("-l".into());
            args.push(language.into());
        }

        if let Some(mode) = self.page_segmentation_mode {
            args.push("--psm".into());
            args.push(mode.to_string().into());
        }

        if let Some(config) = &self.extra_config {
            args.extend(config.split_whitespace().map(OsString::from));
        }

        args
    }
}

/// Partial options; `None` means "not provided"
///
/// For the nullable keys, `Some(None)` is an explicit `null` and clears the
/// base value. `binaryPath`, `env` and `timeoutMs` cannot be cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptionOverrides {
    #[serde(default, alias = "l", deserialize_with = "explicit_null")]
    pub language: Option<Option<String>>,
    #[serde(default, alias = "psm", deserialize_with = "explicit_null")]
    pub page_segmentation_mode: Option<Option<u32>>,
    #[serde(default, alias = "config", deserialize_with = "explicit_null")]
    pub extra_config: Option<Option<String>>,
    #[serde(default, alias = "binary")]
    pub binary_path: Option<String>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl OptionOverrides {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// Only called when the key is present, so a present `null` becomes `Some(None)`.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
