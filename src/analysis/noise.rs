use image::{GrayImage, RgbImage};
use imageproc::filter::laplacian_filter;
use statrs::statistics::Statistics;

use crate::{
    NoiseProfile,
    deadline::Deadline,
    error::{ForensicsError, Result},
    image_utils::{rgb_to_hsv_planes, rgb_to_ycrcb_planes},
};

/// Variance of the 4-neighbour Laplacian response over the whole plane.
pub fn laplacian_variance(channel: &GrayImage) -> f64 {
    let response = laplacian_filter(channel);
    let variance = response.pixels().map(|p| p[0] as f64).population_variance();

    if variance.is_finite() { variance.max(0.0) } else { 0.0 }
}

pub struct ChannelNoiseAnalyzer;

impl ChannelNoiseAnalyzer {
    /// High-frequency energy of the hue, saturation and both chroma planes.
    /// Luma and value are left out.
    pub fn profile(image: &RgbImage, deadline: &Deadline) -> Result<NoiseProfile> {
        let (width, height) = image.dimensions();
        if width < 3 || height < 3 {
            return Err(ForensicsError::SplicingAnalysisFailed(format!(
                "image of {}x{} is too small for color-space analysis",
                width, height
            )));
        }

        let (hue, saturation, _value) = rgb_to_hsv_planes(image);
        let (_luma, chroma_red, chroma_blue) = rgb_to_ycrcb_planes(image);

        let mut energies = [0.0f64; 4];
        for (energy, plane) in energies
            .iter_mut()
            .zip([&hue, &saturation, &chroma_red, &chroma_blue])
        {
            deadline.check(ForensicsError::SplicingAnalysisFailed)?;
            *energy = laplacian_variance(plane);
        }

        Ok(NoiseProfile {
            hue: energies[0],
            saturation: energies[1],
            chroma_red: energies[2],
            chroma_blue: energies[3],
        })
    }
}
