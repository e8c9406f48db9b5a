use std::{fs, path::PathBuf, sync::Arc};

use image::{ImageFormat, Rgb, RgbImage, imageops};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tamper_forensics::{
    AnalysisConfig, ForensicsAnalyzer,
    deadline::Deadline,
    detection::ResultType,
    error::ForensicsError,
    progress::{ProgressLog, Stage},
    report::JsonReport,
};
use tempfile::TempDir;

fn noise_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| {
        Rgb([rng.gen_range(0..=255u8), rng.gen_range(0..=255u8), rng.gen_range(0..=255u8)])
    })
}

fn copy_moved(seed: u64) -> RgbImage {
    let mut image = noise_rgb(160, 120, seed);
    let patch = imageops::crop_imm(&image, 8, 8, 56, 56).to_image();
    imageops::replace(&mut image, &patch, 96, 60);
    image
}

fn save(dir: &TempDir, name: &str, image: &RgbImage, format: ImageFormat) -> PathBuf {
    let path = dir.path().join(name);
    image.save_with_format(&path, format).unwrap();
    path
}

fn assert_well_formed(result_type: ResultType, confidence: f64) {
    assert!(matches!(
        result_type,
        ResultType::CopyMove | ResultType::Splicing | ResultType::Authentic
    ));
    assert!((0.0..=100.0).contains(&confidence));
}

#[test]
fn analyze_reports_copy_move_evidence() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "forged.png", &copy_moved(17), ImageFormat::Png);

    let verdict = tamper_forensics::analyze(&path).unwrap();
    assert_well_formed(verdict.result_type, verdict.confidence);

    let evidence = &verdict.technical_data;
    assert!(evidence.copy_move.is_copy_move);
    assert!(evidence.copy_move.inlier_count > 4);
    assert!(evidence.ela.mean_difference >= 0.0);
    assert!(evidence.ela.std_deviation >= 0.0);
    assert_eq!(evidence.image_info.width, 160);
    assert_eq!(evidence.image_info.format, "PNG");
    assert!(evidence.processing_time > 0.0);

    if evidence.copy_move.confidence > 70.0 {
        assert_eq!(verdict.result_type, ResultType::CopyMove);
        assert_eq!(verdict.confidence, evidence.copy_move.confidence);
    }
}

#[test]
fn analyze_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(3), ImageFormat::Png);

    let first = tamper_forensics::analyze(&path).unwrap();
    let second = tamper_forensics::analyze(&path).unwrap();

    assert_eq!(first.result_type, second.result_type);
    assert!((first.confidence - second.confidence).abs() <= 1e-6);
    assert_eq!(
        first.technical_data.copy_move.match_count,
        second.technical_data.copy_move.match_count
    );
    assert!((first.technical_data.splicing.noise_diff - second.technical_data.splicing.noise_diff).abs() <= 1e-6);
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(8), ImageFormat::Png);

    let parallel = ForensicsAnalyzer::new().analyze(&path).unwrap();
    let sequential = ForensicsAnalyzer::new()
        .with_config(AnalysisConfig {
            parallel: false,
            ..AnalysisConfig::default()
        })
        .analyze(&path)
        .unwrap();

    assert_eq!(parallel.result_type, sequential.result_type);
    assert!((parallel.confidence - sequential.confidence).abs() <= 1e-6);
}

#[test]
fn unique_texture_jpeg_is_well_formed() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "photo.jpg", &noise_rgb(128, 96, 77), ImageFormat::Jpeg);

    let verdict = tamper_forensics::analyze(&path).unwrap();
    assert_well_formed(verdict.result_type, verdict.confidence);
    assert_eq!(verdict.technical_data.image_info.format, "JPEG");
    assert!(!verdict.technical_data.copy_move.is_copy_move);
    assert_eq!(verdict.technical_data.copy_move.confidence, 0.0);
}

#[test]
fn progress_is_reported_for_every_stage() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(5), ImageFormat::Png);

    let progress = Arc::new(ProgressLog::new());
    ForensicsAnalyzer::new()
        .with_config(AnalysisConfig {
            parallel: false,
            ..AnalysisConfig::default()
        })
        .with_progress(progress.clone())
        .analyze(&path)
        .unwrap();

    let stages = progress.events().iter().map(|e| e.stage).collect::<Vec<_>>();
    assert_eq!(
        stages,
        vec![Stage::Loading, Stage::Ela, Stage::CopyMove, Stage::Splicing, Stage::Fusion]
    );
    let fractions = progress.events().iter().map(|e| e.fraction).collect::<Vec<_>>();
    assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    assert!(progress.is_complete());
}

#[test]
fn parallel_progress_fractions_increase() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(6), ImageFormat::Png);

    for _ in 0..5 {
        let progress = Arc::new(ProgressLog::new());
        ForensicsAnalyzer::new()
            .with_progress(progress.clone())
            .analyze(&path)
            .unwrap();

        let events = progress.events();
        assert_eq!(events.len(), Stage::COUNT);
        assert_eq!(events[0].stage, Stage::Loading);
        assert_eq!(events[Stage::COUNT - 1].stage, Stage::Fusion);
        let fractions = events.iter().map(|e| e.fraction).collect::<Vec<_>>();
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn truncated_file_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let full = save(&dir, "full.png", &noise_rgb(64, 64, 1), ImageFormat::Png);
    let bytes = fs::read(&full).unwrap();
    let path = dir.path().join("broken.png");
    fs::write(&path, &bytes[..bytes.len() / 3]).unwrap();

    let err = tamper_forensics::analyze(&path).unwrap_err();
    assert!(matches!(err, ForensicsError::UnreadableImage(_)));
    assert!(!err.is_fatal());
}

#[test]
fn garbage_bytes_are_unreadable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("random.png");
    fs::write(&path, b"definitely not an image").unwrap();

    assert!(matches!(
        tamper_forensics::analyze(&path),
        Err(ForensicsError::UnreadableImage(_))
    ));
}

#[test]
fn cancelled_analysis_returns_fatal_error() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(2), ImageFormat::Png);

    let deadline = Deadline::none();
    deadline.cancel();

    let err = ForensicsAnalyzer::new()
        .with_deadline(deadline)
        .analyze(&path)
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn flat_image_aborts_in_copy_move_stage() {
    let dir = TempDir::new().unwrap();
    let flat = RgbImage::from_pixel(64, 64, Rgb([200, 200, 200]));
    let path = save(&dir, "flat.png", &flat, ImageFormat::Png);

    let err = tamper_forensics::analyze(&path).unwrap_err();
    assert!(matches!(err, ForensicsError::CopyMoveAnalysisFailed(_)));
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let err = ForensicsAnalyzer::new()
        .with_config(AnalysisConfig {
            ela_quality: 0,
            ..AnalysisConfig::default()
        })
        .analyze("/nonexistent/photo.jpg")
        .unwrap_err();
    assert!(matches!(err, ForensicsError::InvalidParameter(_)));
}

#[test]
fn report_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "sample.png", &copy_moved(4), ImageFormat::Png);

    let verdict = tamper_forensics::analyze(&path).unwrap();
    let json = JsonReport::from(&verdict).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["result_type"], verdict.result_type.as_str());
    assert!(value["technical_data"]["splicing"]["noise_values"]["h"].is_number());
    assert!(value["technical_data"]["copy_move"]["ransac_inliers"].is_number());

    let full: serde_json::Value = serde_json::from_str(&verdict.to_json().unwrap()).unwrap();
    assert!(full["technical_data"]["ela"]["mean_difference"].is_number());
}
