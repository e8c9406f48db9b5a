pub mod exif;

use image::{ColorType, DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

/// Intrinsic properties of the submitted file, captured together with the
/// decoded raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub color_mode: String,
    pub bit_depth: u16,
    pub format: String,
    pub file_size: Option<u64>,
    pub modified: Option<u64>,
    pub exif: Option<ExifSummary>,
}

impl ImageMetadata {
    pub fn describe(image: &DynamicImage, format: ImageFormat) -> Self {
        let color = image.color();

        Self {
            width: image.width(),
            height: image.height(),
            color_mode: color_mode_name(color).into(),
            bit_depth: color.bits_per_pixel() / u16::from(color.channel_count()),
            format: format_name(format).into(),
            file_size: None,
            modified: None,
            exif: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifSummary {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub software: Option<String>,
    pub date_time: Option<String>,
    pub suspicious_indicators: Vec<String>,
}

pub fn color_mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "L16",
        ColorType::La16 => "LA16",
        ColorType::Rgb16 => "RGB16",
        ColorType::Rgba16 => "RGBA16",
        ColorType::Rgb32F => "RGB32F",
        ColorType::Rgba32F => "RGBA32F",
        _ => "UNKNOWN",
    }
}

pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::WebP => "WEBP",
        _ => "OTHER",
    }
}
