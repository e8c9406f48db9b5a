use std::time::Instant;

use crate::{
    CopyMoveResult, ElaResult, SplicingResult, TechnicalEvidence, Verdict,
    detection::{ConfidenceLevel, ResultType},
    metadata::ImageMetadata,
};

/// Picks the verdict by fixed precedence: copy-move evidence first, then
/// splicing, each only when its detector fired above `decision_threshold`.
/// Raw confidences are never compared against each other.
pub fn decide(copy_move: &CopyMoveResult, splicing: &SplicingResult, decision_threshold: f64) -> (ResultType, f64) {
    if copy_move.is_copy_move && copy_move.confidence > decision_threshold {
        return (ResultType::CopyMove, copy_move.confidence.clamp(0.0, 100.0));
    }

    if splicing.is_splicing && splicing.confidence > decision_threshold {
        return (ResultType::Splicing, splicing.confidence.clamp(0.0, 100.0));
    }

    let strongest = copy_move.confidence.max(splicing.confidence);
    (ResultType::Authentic, (100.0 - strongest).clamp(0.0, 100.0))
}

/// Assembles the verdict. `processing_time` spans from `started` to the end
/// of the decision.
pub fn fuse(
    image_info: ImageMetadata,
    ela: ElaResult,
    copy_move: CopyMoveResult,
    splicing: SplicingResult,
    started: Instant,
    decision_threshold: f64,
) -> Verdict {
    let (result_type, confidence) = decide(&copy_move, &splicing, decision_threshold);
    let processing_time = started.elapsed().as_secs_f64();

    Verdict {
        result_type,
        confidence,
        confidence_level: ConfidenceLevel::from_score(confidence),
        technical_data: TechnicalEvidence {
            image_info,
            ela,
            copy_move,
            splicing,
            processing_time,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{DynamicImage, ImageFormat, RgbImage};

    use crate::{GeometricConsensus, NoiseProfile};

    use super::*;

    fn copy_move(is_copy_move: bool, confidence: f64) -> CopyMoveResult {
        CopyMoveResult {
            is_copy_move,
            confidence,
            match_count: 0,
            inlier_count: 0,
            keypoint_count: 0,
            consensus: GeometricConsensus::not_attempted(),
            matches: Vec::new(),
        }
    }

    fn splicing(is_splicing: bool, confidence: f64) -> SplicingResult {
        SplicingResult {
            is_splicing,
            confidence,
            noise_diff: confidence / 10.0,
            noise_values: NoiseProfile {
                hue: 1.0,
                saturation: 1.0,
                chroma_red: 1.0,
                chroma_blue: 1.0,
            },
        }
    }

    #[test]
    fn test_copy_move_takes_precedence_over_stronger_splicing() {
        let (kind, confidence) = decide(&copy_move(true, 80.0), &splicing(true, 90.0), 70.0);
        assert_eq!(kind, ResultType::CopyMove);
        assert_eq!(confidence, 80.0);
    }

    #[test]
    fn test_splicing_when_copy_move_below_bar() {
        let (kind, confidence) = decide(&copy_move(true, 60.0), &splicing(true, 90.0), 70.0);
        assert_eq!(kind, ResultType::Splicing);
        assert_eq!(confidence, 90.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (kind, confidence) = decide(&copy_move(true, 70.0), &splicing(true, 70.0), 70.0);
        assert_eq!(kind, ResultType::Authentic);
        assert_eq!(confidence, 30.0);
    }

    #[test]
    fn test_authentic_confidence_uses_strongest_signal() {
        let (kind, confidence) = decide(&copy_move(true, 45.0), &splicing(false, 0.0), 70.0);
        assert_eq!(kind, ResultType::Authentic);
        assert_eq!(confidence, 55.0);

        let (kind, confidence) = decide(&copy_move(false, 0.0), &splicing(false, 0.0), 70.0);
        assert_eq!(kind, ResultType::Authentic);
        assert_eq!(confidence, 100.0);
    }

    #[test]
    fn test_unfired_detector_is_ignored_for_verdict() {
        let (kind, _) = decide(&copy_move(false, 95.0), &splicing(false, 95.0), 70.0);
        assert_eq!(kind, ResultType::Authentic);
    }

    #[test]
    fn test_processing_time_covers_the_whole_run() {
        let started = Instant::now() - Duration::from_millis(50);
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let ela = ElaResult {
            image: RgbImage::new(4, 4),
            quality: 90,
            max_difference: 0,
            mean_difference: 0.0,
            std_deviation: 0.0,
        };

        let before = started.elapsed().as_secs_f64();
        let verdict = fuse(
            ImageMetadata::describe(&image, ImageFormat::Png),
            ela,
            copy_move(false, 0.0),
            splicing(false, 0.0),
            started,
            70.0,
        );
        let after = started.elapsed().as_secs_f64();

        let elapsed = verdict.technical_data.processing_time;
        assert!(elapsed >= before && elapsed <= after);
        assert!(elapsed >= 0.05);
    }
}
