use image::DynamicImage;

use crate::{
    AnalysisConfig, NoiseProfile, SplicingResult,
    analysis::noise::ChannelNoiseAnalyzer,
    deadline::Deadline,
    error::Result,
};

/// Flags images whose chrominance planes carry very different noise energy,
/// which points at content assembled from differently processed sources.
pub struct SplicingDetector {
    ratio_threshold: f64,
}

impl SplicingDetector {
    pub fn new() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            ratio_threshold: config.noise_ratio_threshold,
        }
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<SplicingResult> {
        self.detect_with_deadline(image, &Deadline::none())
    }

    pub fn detect_with_deadline(&self, image: &DynamicImage, deadline: &Deadline) -> Result<SplicingResult> {
        let rgb = image.to_rgb8();
        let profile = ChannelNoiseAnalyzer::profile(&rgb, deadline)?;
        let result = self.evaluate(profile);

        log::debug!(
            "splicing: noise h={:.2} s={:.2} cr={:.2} cb={:.2}, ratio {:.3}",
            profile.hue,
            profile.saturation,
            profile.chroma_red,
            profile.chroma_blue,
            result.noise_diff
        );

        Ok(result)
    }

    /// A zero-energy channel only occurs on flat input; the ratio is then
    /// reported as 0 and the image is not flagged.
    pub fn evaluate(&self, profile: NoiseProfile) -> SplicingResult {
        let min = profile.min();
        let noise_diff = if min > 0.0 { profile.max() / min } else { 0.0 };

        let is_splicing = noise_diff > self.ratio_threshold;
        let confidence = if is_splicing { (noise_diff * 10.0).min(100.0) } else { 0.0 };

        SplicingResult {
            is_splicing,
            confidence,
            noise_diff,
            noise_values: profile,
        }
    }
}

impl Default for SplicingDetector {
    fn default() -> Self {
        Self::new()
    }
}
