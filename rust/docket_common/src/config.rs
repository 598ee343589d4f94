//! Runtime configuration, read from flags or `DOCKET_*` environment variables.

use std::path::{Path, PathBuf};

use clap::Args;
use docket_converter::DEFAULT_LIBREOFFICE_PATH;

use crate::error::{CommonError, Result};

pub const ACL_DATABASE_FILE: &str = "acl.redb";

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the ACL database
    #[arg(long, env = "DOCKET_DATA_DIR", default_value = "./docket_data")]
    pub data_dir: PathBuf,

    /// Scratch directory for conversions; a private one is created if unset
    #[arg(long, env = "DOCKET_TEMPORARY_DIRECTORY")]
    pub temporary_directory: Option<PathBuf>,

    /// LibreOffice binary used to convert office documents
    #[arg(long, env = "DOCKET_LIBREOFFICE_PATH", default_value = DEFAULT_LIBREOFFICE_PATH)]
    pub libreoffice_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./docket_data"),
            temporary_directory: None,
            libreoffice_path: PathBuf::from(DEFAULT_LIBREOFFICE_PATH),
        }
    }
}

impl AppConfig {
    /// Config rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CommonError::Config("data directory must not be empty".into()));
        }
        if self.libreoffice_path.as_os_str().is_empty() {
            return Err(CommonError::Config("libreoffice path must not be empty".into()));
        }
        Ok(())
    }

    pub fn acl_database_path(&self) -> PathBuf {
        self.data_dir.join(ACL_DATABASE_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
