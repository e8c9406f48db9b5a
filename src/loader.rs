use std::{fs, path::Path, time::UNIX_EPOCH};

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::{
    error::{ForensicsError, Result},
    metadata::{ImageMetadata, exif::ExifExtractor, format_name},
};

pub const ACCEPTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

/// A decoded, validated raster. Detectors only ever see it by shared
/// reference and derive their own copies.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pixels: DynamicImage,
    metadata: ImageMetadata,
}

impl LoadedImage {
    pub fn from_image(pixels: DynamicImage, format: ImageFormat) -> Self {
        let metadata = ImageMetadata::describe(&pixels, format);
        Self { pixels, metadata }
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedImage> {
    let path = path.as_ref();
    let display = path.display().to_string();

    check_extension(path)?;

    let file_meta = fs::metadata(path)
        .map_err(|e| ForensicsError::UnreadableImage(format!("{}: {}", display, e)))?;
    if file_meta.len() == 0 {
        return Err(ForensicsError::UnreadableImage(format!("{}: empty file", display)));
    }

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| ForensicsError::UnreadableImage(format!("{}: {}", display, e)))?;

    let format = match reader.format() {
        Some(f) if ACCEPTED_FORMATS.contains(&f) => f,
        Some(f) => {
            return Err(ForensicsError::UnsupportedFormat(format!(
                "{}: content is {:?}",
                display, f
            )));
        }
        None => {
            return Err(ForensicsError::UnreadableImage(format!(
                "{}: unrecognized image data",
                display
            )));
        }
    };

    let pixels = reader
        .decode()
        .map_err(|e| ForensicsError::UnreadableImage(format!("{}: {}", display, e)))?;

    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(ForensicsError::UnreadableImage(format!("{}: zero-sized image", display)));
    }

    let mut metadata = ImageMetadata::describe(&pixels, format);
    metadata.file_size = Some(file_meta.len());
    metadata.modified = file_meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    metadata.exif = ExifExtractor::extract(path);

    log::debug!(
        "loaded {}: {}x{} {} {}",
        display,
        metadata.width,
        metadata.height,
        metadata.color_mode,
        format_name(format)
    );

    Ok(LoadedImage { pixels, metadata })
}

fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ref e) if ACCEPTED_EXTENSIONS.contains(&e.as_str()) => Ok(()),
        Some(e) => Err(ForensicsError::UnsupportedFormat(format!(".{} files are not accepted", e))),
        None => Err(ForensicsError::UnsupportedFormat(format!(
            "{}: missing file extension",
            path.display()
        ))),
    }
}
