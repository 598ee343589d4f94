//! Office document to PDF conversion through an external LibreOffice binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{ConverterError, Result};

pub const DEFAULT_LIBREOFFICE_PATH: &str = "/usr/bin/libreoffice";

/// Turns an office document into PDF bytes.
pub trait OfficeBackend: Send + Sync {
    fn convert_to_pdf(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Headless LibreOffice invocation.
///
/// The input is written to a named temp file inside `temp_dir` and
/// LibreOffice writes `<stem>.pdf` next to it. `HOME` points at `temp_dir`
/// so the profile directory lands there too.
#[derive(Debug, Clone)]
pub struct LibreOffice {
    binary: PathBuf,
    temp_dir: PathBuf,
}

impl Default for LibreOffice {
    fn default() -> Self {
        Self::new(DEFAULT_LIBREOFFICE_PATH, std::env::temp_dir())
    }
}

impl LibreOffice {
    pub fn new(binary: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

impl OfficeBackend for LibreOffice {
    fn convert_to_pdf(&self, data: &[u8]) -> Result<Vec<u8>> {
        if !self.binary.exists() {
            return Err(ConverterError::ConverterNotFound(self.binary.clone()));
        }

        let mut input = tempfile::Builder::new()
            .prefix("docket-")
            .tempfile_in(&self.temp_dir)?;
        input.write_all(data)?;
        input.flush()?;

        let stem = input
            .path()
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        let output = RemoveOnDrop(self.temp_dir.join(stem).with_extension("pdf"));

        debug!(binary = %self.binary.display(), input = %input.path().display(), "running office converter");
        let result = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg(input.path())
            .arg("--outdir")
            .arg(&self.temp_dir)
            .env("HOME", &self.temp_dir)
            .output()?;

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if !result.status.success() {
            warn!(status = ?result.status.code(), %stderr, "office conversion failed");
            return Err(ConverterError::OfficeConversion {
                status: result.status.code(),
                stderr,
            });
        }

        let pdf = fs::read(&output.0).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::OfficeConversion {
                    status: result.status.code(),
                    stderr: format!("no output produced: {stderr}"),
                }
            } else {
                e.into()
            }
        })?;
        debug!(bytes = pdf.len(), "office conversion finished");
        Ok(pdf)
    }
}

/// Deletes the converter output however the conversion exits.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}
