use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConverterError {
    /// The office converter exited unsuccessfully.
    #[error("office conversion failed (exit status {status:?}): {stderr}")]
    OfficeConversion { status: Option<i32>, stderr: String },

    /// Content is neither a loadable image nor a convertible document.
    #[error("unknown file format: {mime_type}")]
    UnknownFileFormat { mime_type: String },

    /// The configured converter binary does not exist.
    #[error("office converter not found at {}", .0.display())]
    ConverterNotFound(PathBuf),

    #[error("page {page} out of range ({count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("invalid transformation: {0}")]
    InvalidTransformation(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConverterError>;
