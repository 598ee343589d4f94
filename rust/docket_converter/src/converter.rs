//! Page-oriented access to a document's content.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::{ConverterError, Result};
use crate::mime::{is_office_mime, MimeClassifier, PDF_MIME_TYPE};
use crate::office::{LibreOffice, OfficeBackend};
use crate::transform::Transformation;

/// Renders pages of a paginated document format (PDF) to images.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, document: &[u8]) -> Result<usize>;
    fn render_page(&self, document: &[u8], page: usize) -> Result<DynamicImage>;
}

/// Holds one document and the currently loaded page.
///
/// Raster images are decoded directly; GIF frames count as pages. Office
/// documents are converted to PDF once and the result is reused for every
/// later page. PDF pages need a [`PageRasterizer`].
pub struct Converter {
    data: Vec<u8>,
    mime_type: String,
    office: Box<dyn OfficeBackend>,
    rasterizer: Option<Box<dyn PageRasterizer>>,
    converted: Option<Vec<u8>>,
    image: Option<DynamicImage>,
    page: usize,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("converted", &self.converted.as_ref().map(Vec::len))
            .field("page", &self.page)
            .finish()
    }
}

impl Converter {
    /// `mime_type` wins over classification when given.
    pub fn new(data: Vec<u8>, mime_type: Option<&str>, classifier: &dyn MimeClassifier) -> Self {
        let mime_type = match mime_type {
            Some(mime) => mime.to_string(),
            None => classifier.classify(&data),
        };
        Self {
            data,
            mime_type,
            office: Box::new(LibreOffice::default()),
            rasterizer: None,
            converted: None,
            image: None,
            page: 0,
        }
    }

    pub fn with_office_backend(mut self, backend: impl OfficeBackend + 'static) -> Self {
        self.office = Box::new(backend);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl PageRasterizer + 'static) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The loaded page, if any.
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Load page `page` (0-based).
    pub fn seek(&mut self, page: usize) -> Result<()> {
        if let Ok(format) = image::guess_format(&self.data) {
            self.image = Some(load_frame(&self.data, format, page)?);
            self.page = page;
            return Ok(());
        }

        self.paginate()?;
        let image = {
            let rasterizer = self.rasterizer()?;
            let document = self.document();
            let count = rasterizer.page_count(document)?;
            if page >= count {
                return Err(ConverterError::PageOutOfRange { page, count });
            }
            rasterizer.render_page(document, page)?
        };
        self.image = Some(image);
        self.page = page;
        Ok(())
    }

    /// Encode the loaded page, loading the first page if none is.
    pub fn get_page(&mut self, format: ImageFormat) -> Result<Vec<u8>> {
        let image = self.loaded()?;
        let mut buffer = Cursor::new(Vec::new());
        match format {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, format)?,
            _ => image.write_to(&mut buffer, format)?,
        }
        Ok(buffer.into_inner())
    }

    /// Make the document paginated and select `page`: office formats are
    /// converted to PDF the first time; PDF passes through. Anything else is
    /// an unknown format. The selection is kept only when conversion succeeds.
    pub fn convert(&mut self, page: usize) -> Result<()> {
        self.paginate()?;
        self.page = page;
        Ok(())
    }

    fn paginate(&mut self) -> Result<()> {
        if self.converted.is_some() {
            debug!("reusing converted document");
            return Ok(());
        }
        if is_office_mime(&self.mime_type) {
            debug!(mime_type = %self.mime_type, "converting office document to pdf");
            let pdf = self.office.convert_to_pdf(&self.data)?;
            self.converted = Some(pdf);
            self.mime_type = PDF_MIME_TYPE.to_string();
            return Ok(());
        }
        if self.mime_type == PDF_MIME_TYPE {
            return Ok(());
        }
        Err(ConverterError::UnknownFileFormat {
            mime_type: self.mime_type.clone(),
        })
    }

    pub fn transform(&mut self, transformation: &Transformation) -> Result<()> {
        let image = transformation.execute_on(self.loaded()?)?;
        self.image = Some(image);
        Ok(())
    }

    /// Apply `transformations` in order. The page is left untouched if any
    /// of them fails.
    pub fn transform_many<'t, I>(&mut self, transformations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'t Transformation>,
    {
        let mut image = self.loaded()?.clone();
        for transformation in transformations {
            image = transformation.execute_on(&image)?;
        }
        self.image = Some(image);
        Ok(())
    }

    pub fn get_page_count(&mut self) -> Result<usize> {
        if let Ok(format) = image::guess_format(&self.data) {
            if format == ImageFormat::Gif {
                return Ok(gif_frames(&self.data)?.len());
            }
            return Ok(1);
        }
        self.paginate()?;
        self.rasterizer()?.page_count(self.document())
    }

    fn loaded(&mut self) -> Result<&DynamicImage> {
        if self.image.is_none() {
            self.seek(0)?;
        }
        self.image.as_ref().ok_or_else(|| ConverterError::UnknownFileFormat {
            mime_type: self.mime_type.clone(),
        })
    }

    fn document(&self) -> &[u8] {
        self.converted.as_deref().unwrap_or(&self.data)
    }

    fn rasterizer(&self) -> Result<&dyn PageRasterizer> {
        self.rasterizer
            .as_deref()
            .ok_or_else(|| ConverterError::UnknownFileFormat {
                mime_type: self.mime_type.clone(),
            })
    }
}

fn gif_frames(data: &[u8]) -> Result<Vec<image::Frame>> {
    let decoder = GifDecoder::new(Cursor::new(data))?;
    Ok(decoder.into_frames().collect_frames()?)
}

fn load_frame(data: &[u8], format: ImageFormat, page: usize) -> Result<DynamicImage> {
    if format == ImageFormat::Gif {
        let frames = gif_frames(data)?;
        let count = frames.len();
        let frame = frames
            .into_iter()
            .nth(page)
            .ok_or(ConverterError::PageOutOfRange { page, count })?;
        return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
    }
    if page > 0 {
        return Err(ConverterError::PageOutOfRange { page, count: 1 });
    }
    Ok(image::load_from_memory_with_format(data, format)?)
}
