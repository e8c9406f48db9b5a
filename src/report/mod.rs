use serde::Serialize;

use crate::{NoiseProfile, Verdict, metadata::ImageMetadata};

/// Flat result document in the shape the web front end renders.
#[derive(Serialize)]
pub struct JsonReport {
    pub result_type: String,
    pub confidence: f64,
    pub technical_data: TechnicalDataSection,
}

#[derive(Serialize)]
pub struct TechnicalDataSection {
    pub image_info: ImageMetadata,
    pub ela: ElaReportSection,
    pub copy_move: CopyMoveReportSection,
    pub splicing: SplicingReportSection,
    pub processing_time: f64,
}

#[derive(Serialize)]
pub struct ElaReportSection {
    pub mean: f64,
    pub std: f64,
}

#[derive(Serialize)]
pub struct CopyMoveReportSection {
    pub matches: usize,
    pub ransac_inliers: usize,
}

#[derive(Serialize)]
pub struct SplicingReportSection {
    pub noise_diff: f64,
    pub noise_values: NoiseProfile,
}

impl From<&Verdict> for JsonReport {
    fn from(verdict: &Verdict) -> Self {
        let data = &verdict.technical_data;
        Self {
            result_type: verdict.result_type.as_str().into(),
            confidence: verdict.confidence,
            technical_data: TechnicalDataSection {
                image_info: data.image_info.clone(),
                ela: ElaReportSection {
                    mean: data.ela.mean_difference,
                    std: data.ela.std_deviation,
                },
                copy_move: CopyMoveReportSection {
                    matches: data.copy_move.match_count,
                    ransac_inliers: data.copy_move.inlier_count,
                },
                splicing: SplicingReportSection {
                    noise_diff: data.splicing.noise_diff,
                    noise_values: data.splicing.noise_values,
                },
                processing_time: data.processing_time,
            },
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use image::{ImageFormat, RgbImage};

    use super::*;
    use crate::{
        CopyMoveResult, ElaResult, GeometricConsensus, SplicingResult,
        detection::fusion::fuse,
    };

    #[test]
    fn test_report_uses_front_end_keys() {
        let image = image::DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let verdict = fuse(
            ImageMetadata::describe(&image, ImageFormat::Jpeg),
            ElaResult {
                image: RgbImage::new(8, 8),
                quality: 90,
                max_difference: 3,
                mean_difference: 1.25,
                std_deviation: 0.5,
            },
            CopyMoveResult {
                is_copy_move: false,
                confidence: 0.0,
                match_count: 3,
                inlier_count: 0,
                keypoint_count: 40,
                consensus: GeometricConsensus::not_attempted(),
                matches: Vec::new(),
            },
            SplicingResult {
                is_splicing: false,
                confidence: 0.0,
                noise_diff: 1.8,
                noise_values: NoiseProfile {
                    hue: 2.0,
                    saturation: 3.6,
                    chroma_red: 2.5,
                    chroma_blue: 3.0,
                },
            },
            Instant::now(),
            70.0,
        );

        let json = serde_json::to_value(JsonReport::from(&verdict)).unwrap();
        assert_eq!(json["result_type"], "authentic");
        assert_eq!(json["confidence"], 100.0);
        assert_eq!(json["technical_data"]["ela"]["mean"], 1.25);
        assert_eq!(json["technical_data"]["copy_move"]["matches"], 3);
        assert_eq!(json["technical_data"]["copy_move"]["ransac_inliers"], 0);
        assert_eq!(json["technical_data"]["splicing"]["noise_values"]["s"], 3.6);
        assert_eq!(json["technical_data"]["image_info"]["format"], "JPEG");
        assert!(json["technical_data"]["processing_time"].as_f64().unwrap() >= 0.0);
    }
}
