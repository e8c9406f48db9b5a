use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use statrs::statistics::Statistics;

use crate::{
    ElaResult,
    deadline::Deadline,
    error::{ForensicsError, Result},
    image_utils::abs_difference,
};

pub struct ElaAnalyzer {
    quality: u8,
}

impl ElaAnalyzer {
    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(ForensicsError::InvalidParameter(format!(
                "ELA quality must be between 1 and 100, got {}",
                quality
            )));
        }

        Ok(Self { quality })
    }

    pub fn analyze(&self, image: &DynamicImage) -> Result<ElaResult> {
        self.analyze_with_deadline(image, &Deadline::none())
    }

    pub fn analyze_with_deadline(&self, image: &DynamicImage, deadline: &Deadline) -> Result<ElaResult> {
        deadline.check(ForensicsError::ElaComputationFailed)?;

        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();
        if width == 0 || height == 0 {
            return Err(ForensicsError::ElaComputationFailed("empty image".into()));
        }

        let resaved = self.recompress_jpeg(&rgb_image)?;
        if resaved.dimensions() != (width, height) {
            return Err(ForensicsError::ElaComputationFailed(format!(
                "recompressed image is {}x{}, expected {}x{}",
                resaved.width(),
                resaved.height(),
                width,
                height
            )));
        }

        deadline.check(ForensicsError::ElaComputationFailed)?;

        let difference = abs_difference(&rgb_image, &resaved);

        let max_difference = difference.fold(0.0f64, |m, &v| m.max(v));
        let max_observed = if max_difference == 0.0 { 1.0 } else { max_difference };
        let scale = 255.0 / max_observed;

        let scaled = difference.mapv(|d| (d * scale).round().min(255.0));

        let mean_difference = scaled.iter().mean();
        let std_deviation = scaled.iter().population_std_dev();

        let mut ela_image = RgbImage::new(width, height);
        for (x, y, pixel) in ela_image.enumerate_pixels_mut() {
            let (row, col) = (y as usize, x as usize);
            *pixel = Rgb([
                scaled[[row, col, 0]] as u8,
                scaled[[row, col, 1]] as u8,
                scaled[[row, col, 2]] as u8,
            ]);
        }

        log::debug!(
            "ELA q{}: max {:.0}, mean {:.3}, std {:.3}",
            self.quality,
            max_difference,
            mean_difference,
            std_deviation
        );

        Ok(ElaResult {
            image: ela_image,
            quality: self.quality,
            max_difference: max_difference as u8,
            mean_difference: mean_difference.max(0.0),
            std_deviation: std_deviation.max(0.0),
        })
    }

    /// JPEG round trip through a buffer owned by this call; the buffer is
    /// dropped on every return path.
    fn recompress_jpeg(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut buffer = Cursor::new(Vec::new());

        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        image
            .write_with_encoder(encoder)
            .map_err(|e| ForensicsError::ElaComputationFailed(format!("JPEG encode: {}", e)))?;

        let recompressed = image::load_from_memory_with_format(buffer.get_ref(), ImageFormat::Jpeg)
            .map_err(|e| ForensicsError::ElaComputationFailed(format!("JPEG decode: {}", e)))?;

        Ok(recompressed.to_rgb8())
    }
}
