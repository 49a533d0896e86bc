use crate::Args;
use std::time::Duration;
use tesseract_runner::RecognitionOptions;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    /// Base options every request's overrides are merged onto
    pub defaults: RecognitionOptions,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut defaults = RecognitionOptions::default()
            .with_language(args.default_language)
            .with_page_segmentation_mode(args.default_psm)
            .with_binary_path(args.binary);

        defaults.extra_config = args.extra_config;
        defaults.timeout = args.timeout_secs.map(Duration::from_secs);

        if let Some(tessdata) = args.tessdata_path {
            defaults = defaults.with_env("TESSDATA_PREFIX", tessdata);
        }

        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            defaults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_from_args() {
        let args = Args::try_parse_from(["tesseract-runner-server"]).unwrap();
        let config = Config::from(args);

        assert_eq!(config.port, 9292);
        assert_eq!(config.defaults.language.as_deref(), Some("eng"));
        assert_eq!(config.defaults.page_segmentation_mode, Some(3));
        assert_eq!(config.defaults.binary_path, "tesseract");
    }

    #[test]
    fn test_tessdata_is_forwarded_as_env() {
        let args = Args::try_parse_from([
            "tesseract-runner-server",
            "--tessdata-path",
            "/opt/tessdata",
            "--timeout-secs",
            "30",
            "--binary",
            "/usr/bin/tesseract",
        ])
        .unwrap();
        let config = Config::from(args);

        assert_eq!(
            config.defaults.env.get("TESSDATA_PREFIX").map(String::as_str),
            Some("/opt/tessdata")
        );
        assert_eq!(config.defaults.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.defaults.binary_path, "/usr/bin/tesseract");
    }
}
