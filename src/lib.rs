use std::{path::Path, sync::Arc, time::Instant};

use image::RgbImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{copy_move::CopyMoveDetector, ela::ElaAnalyzer},
    deadline::Deadline,
    detection::{ConfidenceLevel, ResultType, fusion, splicing::SplicingDetector},
    error::{ForensicsError, Result},
    loader::LoadedImage,
    metadata::ImageMetadata,
    progress::{NoProgress, ProgressSink, Stage},
};

pub mod error;
pub mod image_utils;
pub mod analysis;
pub mod detection;
pub mod deadline;
pub mod loader;
pub mod metadata;
pub mod progress;
pub mod report;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ela_quality: u8,
    pub ratio_threshold: f64,
    pub min_match_distance: f64,
    pub ransac_threshold: f64,
    pub ransac_iterations: usize,
    pub ransac_seed: u64,
    pub min_matches: usize,
    pub min_inliers: usize,
    pub fast_threshold: u8,
    pub pyramid_levels: usize,
    pub max_keypoints: usize,
    pub noise_ratio_threshold: f64,
    pub decision_threshold: f64,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ela_quality: 90,
            ratio_threshold: 0.7,
            min_match_distance: 10.0,
            ransac_threshold: 5.0,
            ransac_iterations: 2000,
            ransac_seed: 0x5eed,
            min_matches: 10,
            min_inliers: 4,
            fast_threshold: 20,
            pyramid_levels: 3,
            max_keypoints: 2000,
            noise_ratio_threshold: 2.5,
            decision_threshold: 70.0,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.ela_quality) {
            return Err(ForensicsError::InvalidParameter(format!(
                "ela_quality must be between 1 and 100, got {}",
                self.ela_quality
            )));
        }
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(ForensicsError::InvalidParameter(
                "ratio_threshold must be in (0, 1]".into(),
            ));
        }
        if !(self.ransac_threshold > 0.0) {
            return Err(ForensicsError::InvalidParameter(
                "ransac_threshold must be positive".into(),
            ));
        }
        if self.ransac_iterations == 0 || self.max_keypoints == 0 || self.pyramid_levels == 0 {
            return Err(ForensicsError::InvalidParameter(
                "ransac_iterations, max_keypoints and pyramid_levels must be non-zero".into(),
            ));
        }
        if !(self.noise_ratio_threshold >= 1.0) {
            return Err(ForensicsError::InvalidParameter(
                "noise_ratio_threshold must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.decision_threshold) {
            return Err(ForensicsError::InvalidParameter(
                "decision_threshold must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

/// Drives one analysis: load, run ELA, copy-move and splicing on the same
/// read-only image, then fuse. Holds no state between calls.
pub struct ForensicsAnalyzer {
    config: AnalysisConfig,
    progress: Arc<dyn ProgressSink>,
    deadline: Deadline,
}

impl Default for ForensicsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ForensicsAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            progress: Arc::new(NoProgress),
            deadline: Deadline::none(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<Verdict> {
        let started = Instant::now();
        self.config.validate()?;

        let image = loader::load(path)?;
        let completed = Mutex::new(0usize);
        self.stage_done(Stage::Loading, &completed);

        self.run(&image, started, &completed)
    }

    /// Runs the detectors on an image that is already in memory.
    pub fn analyze_image(&self, image: &LoadedImage) -> Result<Verdict> {
        let started = Instant::now();
        self.config.validate()?;

        let completed = Mutex::new(0usize);
        self.stage_done(Stage::Loading, &completed);

        self.run(image, started, &completed)
    }

    fn run(&self, image: &LoadedImage, started: Instant, completed: &Mutex<usize>) -> Result<Verdict> {
        let ela_analyzer = ElaAnalyzer::new(self.config.ela_quality)?;
        let copy_move_detector = CopyMoveDetector::from_config(&self.config)?;
        let splicing_detector = SplicingDetector::from_config(&self.config);
        let pixels = image.pixels();
        let deadline = &self.deadline;

        let ela_stage = || {
            let result = ela_analyzer.analyze_with_deadline(pixels, deadline);
            if result.is_ok() {
                self.stage_done(Stage::Ela, completed);
            }
            result
        };
        let copy_move_stage = || {
            let result = copy_move_detector.detect_with_deadline(pixels, deadline);
            if result.is_ok() {
                self.stage_done(Stage::CopyMove, completed);
            }
            result
        };
        let splicing_stage = || {
            let result = splicing_detector.detect_with_deadline(pixels, deadline);
            if result.is_ok() {
                self.stage_done(Stage::Splicing, completed);
            }
            result
        };

        let (ela, copy_move, splicing) = if self.config.parallel {
            let (ela, (copy_move, splicing)) =
                rayon::join(ela_stage, || rayon::join(copy_move_stage, splicing_stage));
            (ela?, copy_move?, splicing?)
        } else {
            let ela = ela_stage()?;
            let copy_move = copy_move_stage()?;
            let splicing = splicing_stage()?;
            (ela, copy_move, splicing)
        };

        let verdict = fusion::fuse(
            image.metadata().clone(),
            ela,
            copy_move,
            splicing,
            started,
            self.config.decision_threshold,
        );
        self.stage_done(Stage::Fusion, completed);

        log::info!(
            "verdict: {} ({:.1}%) in {:.3}s",
            verdict.result_type,
            verdict.confidence,
            verdict.technical_data.processing_time
        );

        Ok(verdict)
    }

    /// Counting and reporting share one lock so sinks see fractions in
    /// increasing order even when detectors finish concurrently.
    fn stage_done(&self, stage: Stage, completed: &Mutex<usize>) {
        let mut done = completed.lock();
        *done += 1;
        let fraction = *done as f64 / Stage::COUNT as f64;
        log::debug!("{} complete ({:.0}%)", stage.name(), fraction * 100.0);
        self.progress.report(stage, fraction);
    }
}

/// Analyzes one file with the default configuration.
pub fn analyze<P: AsRef<Path>>(image_path: P) -> Result<Verdict> {
    ForensicsAnalyzer::new().analyze(image_path)
}

#[derive(Debug, Clone, Serialize)]
pub struct ElaResult {
    #[serde(skip)]
    pub image: RgbImage,
    pub quality: u8,
    pub max_difference: u8,
    pub mean_difference: f64,
    pub std_deviation: f64,
}

impl ElaResult {
    /// Writes the viewable ELA image; the format follows the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
        self.image.save(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeypointMatch {
    pub source_index: usize,
    pub target_index: usize,
    pub source: (f64, f64),
    pub target: (f64, f64),
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometricConsensus {
    pub inlier_count: usize,
    pub transform_attempted: bool,
    pub homography: Option<[f64; 9]>,
}

impl GeometricConsensus {
    pub fn not_attempted() -> Self {
        Self {
            inlier_count: 0,
            transform_attempted: false,
            homography: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CopyMoveResult {
    pub is_copy_move: bool,
    pub confidence: f64,
    pub match_count: usize,
    pub inlier_count: usize,
    pub keypoint_count: usize,
    pub consensus: GeometricConsensus,
    #[serde(skip)]
    pub matches: Vec<KeypointMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    #[serde(rename = "h")]
    pub hue: f64,
    #[serde(rename = "s")]
    pub saturation: f64,
    #[serde(rename = "cr")]
    pub chroma_red: f64,
    #[serde(rename = "cb")]
    pub chroma_blue: f64,
}

impl NoiseProfile {
    pub fn values(&self) -> [f64; 4] {
        [self.hue, self.saturation, self.chroma_red, self.chroma_blue]
    }

    pub fn max(&self) -> f64 {
        self.values().into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.values().into_iter().fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplicingResult {
    pub is_splicing: bool,
    pub confidence: f64,
    pub noise_diff: f64,
    pub noise_values: NoiseProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicalEvidence {
    pub image_info: ImageMetadata,
    pub ela: ElaResult,
    pub copy_move: CopyMoveResult,
    pub splicing: SplicingResult,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub result_type: ResultType,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub technical_data: TechnicalEvidence,
}

impl Verdict {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ela_quality, 90);
        assert_eq!(config.ratio_threshold, 0.7);
        assert_eq!(config.ransac_threshold, 5.0);
        assert_eq!(config.noise_ratio_threshold, 2.5);
        assert_eq!(config.decision_threshold, 70.0);
    }

    #[test]
    fn test_config_rejects_bad_quality() {
        let config = AnalysisConfig {
            ela_quality: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(ForensicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"ela_quality": 85, "parallel": false}"#).unwrap();
        assert_eq!(config.ela_quality, 85);
        assert!(!config.parallel);
        assert_eq!(config.min_matches, 10);
    }

    #[test]
    fn test_ela_save_failure_is_an_io_error() {
        let ela = ElaResult {
            image: RgbImage::new(4, 4),
            quality: 90,
            max_difference: 0,
            mean_difference: 0.0,
            std_deviation: 0.0,
        };
        let dir = tempfile::TempDir::new().unwrap();

        let err = ela.save(dir.path().join("missing").join("ela.png")).unwrap_err();
        assert!(matches!(err, image::ImageError::IoError(_)));

        let path = dir.path().join("ela.png");
        ela.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_noise_profile_extremes() {
        let profile = NoiseProfile {
            hue: 3.0,
            saturation: 9.0,
            chroma_red: 1.5,
            chroma_blue: 4.0,
        };
        assert_eq!(profile.max(), 9.0);
        assert_eq!(profile.min(), 1.5);

        let json = serde_json::to_value(profile).unwrap();
        assert_eq!(json["cr"], 1.5);
    }
}
