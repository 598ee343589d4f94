//! Document page conversion.
//!
//! A [`Converter`] wraps one document: raster images are decoded directly,
//! office documents go through an external [`OfficeBackend`] to PDF, and a
//! [`PageRasterizer`] renders PDF pages. The loaded page can be transformed
//! ([`Transformation`]) and encoded to any format `image` writes.

pub mod converter;
pub mod error;
pub mod mime;
pub mod office;
pub mod transform;

pub use converter::{Converter, PageRasterizer};
pub use error::{ConverterError, Result};
pub use image::ImageFormat;
pub use mime::{is_office_mime, MimeClassifier, SniffingClassifier, OFFICE_MIME_TYPES};
pub use office::{LibreOffice, OfficeBackend, DEFAULT_LIBREOFFICE_PATH};
pub use transform::Transformation;
