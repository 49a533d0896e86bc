//! Shell scripts standing in for the tesseract binary
//!
//! Every script is invoked as `<script> <image> <prefix> [flags..]` and
//! writes (or doesn't write) `<prefix>.<ext>` the way tesseract would.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

pub const PLAIN_TEXT: &str = "Hello World\nOCR 12345\n";

const SCRIPTS: &[(&str, &str)] = &[
    ("plain", "printf 'Hello World\\nOCR 12345\\n' > \"$2.txt\""),
    ("echo_args", "printf '%s\\n' \"$@\" > \"$2.txt\""),
    ("echo_prefix", "sleep 0.2\nprintf '%s' \"$2\" > \"$2.txt\""),
    ("hocr", "printf \"<div class='ocr_page'>Hello</div>\" > \"$2.hocr\""),
    ("html", "printf '<p>Hello</p>' > \"$2.html\""),
    (
        "every_format",
        "printf 'txt' > \"$2.txt\"\nprintf 'html' > \"$2.html\"\nprintf 'hocr' > \"$2.hocr\"",
    ),
    ("utf8", "printf 'Gr\\303\\274\\303\\237e\\n' > \"$2.txt\""),
    ("invalid_utf8", "printf '\\377\\376' > \"$2.txt\""),
    ("env", "printf '%s' \"$OCR_TEST_VALUE\" > \"$2.txt\""),
    ("silent", "exit 0"),
    ("fail", "echo 'Error opening data file' >&2\nexit 1"),
    ("slow", "sleep 5\nprintf 'late' > \"$2.txt\""),
];

pub struct Scripts {
    dir: TempDir,
}

impl Scripts {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn binary(&self, name: &str) -> String {
        self.path(name).to_string_lossy().into_owned()
    }

    /// Any existing file works as the image; the scripts never read it
    pub fn image(&self) -> PathBuf {
        self.dir.path().join("page.png")
    }
}

/// Write all scripts once. Call before spawning anything so no child
/// inherits a script that is still open for writing.
pub fn scripts() -> &'static Scripts {
    static SCRIPTS_DIR: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS_DIR.get_or_init(|| {
        let dir = tempfile::tempdir().expect("Failed to create scripts dir");
        for (name, body) in SCRIPTS {
            write_script(&dir.path().join(name), body);
        }
        fs::write(dir.path().join("page.png"), b"\x89PNG\r\n\x1a\n").expect("Failed to write image");
        Scripts { dir }
    })
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
}

pub fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
