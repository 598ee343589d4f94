//! MIME type classification.

use image::ImageFormat;

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const TEXT_MIME_TYPE: &str = "text/plain";
pub const OCTET_STREAM_MIME_TYPE: &str = "application/octet-stream";

/// MIME types the office converter turns into PDF.
pub const OFFICE_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/mswrite",
    "application/mspowerpoint",
    "application/msexcel",
    "application/pgp-keys",
    "application/vnd.ms-excel",
    "application/vnd.ms-excel.addin.macroEnabled.12",
    "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
    "application/vnd.ms-powerpoint",
    "application/vnd.ms-office",
    "application/vnd.oasis.opendocument.chart",
    "application/vnd.oasis.opendocument.chart-template",
    "application/vnd.oasis.opendocument.formula",
    "application/vnd.oasis.opendocument.formula-template",
    "application/vnd.oasis.opendocument.graphics",
    "application/vnd.oasis.opendocument.graphics-template",
    "application/vnd.oasis.opendocument.image",
    "application/vnd.oasis.opendocument.image-template",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.oasis.opendocument.presentation-template",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.spreadsheet-template",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.text-master",
    "application/vnd.oasis.opendocument.text-template",
    "application/vnd.oasis.opendocument.text-web",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.presentationml.slide",
    "application/vnd.openxmlformats-officedocument.presentationml.slideshow",
    "application/vnd.openxmlformats-officedocument.presentationml.template",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
    "application/xml",
    "text/x-c",
    "text/x-c++",
    "text/x-pascal",
    "text/x-msdos-batch",
    "text/x-python",
    "text/x-shellscript",
    "text/plain",
    "text/rtf",
];

pub fn is_office_mime(mime_type: &str) -> bool {
    OFFICE_MIME_TYPES.contains(&mime_type)
}

/// Service deciding the MIME type of raw content.
pub trait MimeClassifier: Send + Sync {
    fn classify(&self, data: &[u8]) -> String;
}

/// Magic-byte classifier: raster formats known to `image`, PDF, UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffingClassifier;

impl MimeClassifier for SniffingClassifier {
    fn classify(&self, data: &[u8]) -> String {
        if let Ok(format) = image::guess_format(data) {
            return image_mime_type(format).to_string();
        }
        if data.starts_with(b"%PDF") {
            return PDF_MIME_TYPE.to_string();
        }
        if !data.is_empty() && !data.contains(&0) && std::str::from_utf8(data).is_ok() {
            return TEXT_MIME_TYPE.to_string();
        }
        OCTET_STREAM_MIME_TYPE.to_string()
    }
}

fn image_mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        _ => "image/x-unknown",
    }
}
