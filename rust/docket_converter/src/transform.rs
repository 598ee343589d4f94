//! Geometric page transformations.
//!
//! Transformations are stored as JSON objects tagged by `name`, e.g.
//! `{"name":"resize","width":800,"height":600}`, and parsed from the short
//! `name=argument` form used on the command line.

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ConverterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Transformation {
    /// Fit inside `width` x `height`, never enlarging.
    Resize {
        width: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    /// Clockwise rotation.
    Rotate { degrees: i32 },
    /// Scale both dimensions by `percent / 100`.
    Zoom { percent: u32 },
}

/// Largest page a transformation may produce.
pub const MAX_OUTPUT_PIXELS: u64 = 89_478_485;

const CHOICES: &[(&str, &str)] = &[("resize", "Resize"), ("rotate", "Rotate"), ("zoom", "Zoom")];

impl Transformation {
    /// `(name, label)` of every transformation.
    pub fn choices() -> &'static [(&'static str, &'static str)] {
        CHOICES
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Rotate { .. } => "rotate",
            Self::Zoom { .. } => "zoom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "Resize",
            Self::Rotate { .. } => "Rotate",
            Self::Zoom { .. } => "Zoom",
        }
    }

    /// Parse `resize=800x600`, `resize=800`, `rotate=90` or `zoom=150`.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, argument) = s
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected name=argument, got {s:?}")))?;
        let argument = argument.trim();

        match name.trim() {
            "resize" => {
                let (width, height) = match argument.split_once('x') {
                    Some((w, h)) => (parse_number::<u32>(w)?, Some(parse_number::<u32>(h)?)),
                    None => (parse_number::<u32>(argument)?, None),
                };
                Ok(Self::Resize { width, height })
            }
            "rotate" => Ok(Self::Rotate {
                degrees: parse_number(argument)?,
            }),
            "zoom" => Ok(Self::Zoom {
                percent: parse_number(argument)?,
            }),
            other => Err(invalid(format!("unknown transformation {other:?}"))),
        }
    }

    pub fn execute_on(&self, image: &DynamicImage) -> Result<DynamicImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(invalid("image has no pixels"));
        }
        match *self {
            Self::Resize { width, height } => resize(image, width, height),
            Self::Rotate { degrees } => Ok(rotate(image, degrees)),
            Self::Zoom { percent } => zoom(image, percent),
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resize {
                width,
                height: Some(height),
            } => write!(f, "resize={width}x{height}"),
            Self::Resize { width, height: None } => write!(f, "resize={width}"),
            Self::Rotate { degrees } => write!(f, "rotate={degrees}"),
            Self::Zoom { percent } => write!(f, "zoom={percent}"),
        }
    }
}

impl FromStr for Transformation {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(message: impl Into<String>) -> ConverterError {
    ConverterError::InvalidTransformation(message.into())
}

fn parse_number<T: FromStr>(s: &str) -> Result<T> {
    s.trim()
        .parse()
        .map_err(|_| invalid(format!("invalid number {s:?}")))
}

/// Smallest power of two that brings one dimension within twice the target.
fn downsample_factor(src: (u32, u32), target: (u32, u32)) -> u32 {
    let (w, h) = (u64::from(src.0), u64::from(src.1));
    let (tw, th) = (u64::from(target.0), u64::from(target.1));
    let mut factor: u64 = 1;
    while w / factor > 2 * tw && h / factor > 2 * th {
        factor *= 2;
    }
    factor as u32
}

fn resize(image: &DynamicImage, width: u32, height: Option<u32>) -> Result<DynamicImage> {
    if width == 0 || height == Some(0) {
        return Err(invalid("resize dimensions must be positive"));
    }
    let (w, h) = image.dimensions();
    let aspect = f64::from(w) / f64::from(h);
    let height = height.unwrap_or_else(|| ((f64::from(width) / aspect).round() as u32).max(1));

    let factor = downsample_factor((w, h), (width, height));
    let reduced = if factor > 1 {
        image.resize(
            (w / factor).max(1),
            (h / factor).max(1),
            FilterType::Nearest,
        )
    } else {
        image.clone()
    };

    if reduced.width() <= width && reduced.height() <= height {
        return Ok(reduced);
    }
    Ok(reduced.resize(width, height, FilterType::Lanczos3))
}

fn rotate(image: &DynamicImage, degrees: i32) -> DynamicImage {
    match degrees.rem_euclid(360) {
        0 => image.clone(),
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        other => DynamicImage::ImageRgba8(rotate_nearest(&image.to_rgba8(), other)),
    }
}

/// Clockwise rotation about the centre, keeping the canvas size. Uncovered
/// pixels are transparent.
fn rotate_nearest(src: &RgbaImage, degrees: i32) -> RgbaImage {
    let (w, h) = src.dimensions();
    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) / 2.0;

    RgbaImage::from_fn(w, h, |x, y| {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        // Inverse of the clockwise rotation (y axis points down).
        let sx = (dx * cos + dy * sin + cx).floor();
        let sy = (-dx * sin + dy * cos + cy).floor();
        if sx >= 0.0 && sy >= 0.0 && sx < f64::from(w) && sy < f64::from(h) {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn zoom(image: &DynamicImage, percent: u32) -> Result<DynamicImage> {
    if percent == 0 {
        return Err(invalid("zoom percent must be positive"));
    }
    let scale = f64::from(percent) / 100.0;
    let width = (f64::from(image.width()) * scale).floor().max(1.0);
    let height = (f64::from(image.height()) * scale).floor().max(1.0);
    if width * height > MAX_OUTPUT_PIXELS as f64 {
        return Err(invalid(format!(
            "zoom={percent} yields {width}x{height}, over the {MAX_OUTPUT_PIXELS} pixel limit"
        )));
    }
    Ok(image.resize_exact(width as u32, height as u32, FilterType::Lanczos3))
}
