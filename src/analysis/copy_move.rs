use image::DynamicImage;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    AnalysisConfig, CopyMoveResult, GeometricConsensus, KeypointMatch,
    analysis::{
        homography::{Point, RansacConfig, ransac_homography},
        keypoints::{Descriptor, Keypoint, KeypointDetector},
    },
    deadline::Deadline,
    error::{ForensicsError, Result},
    image_utils::rgb_to_gray,
};

const MIN_FIT_MATCHES: usize = 4;

pub struct CopyMoveDetector {
    ratio_threshold: f64,
    min_match_distance: f64,
    min_matches: usize,
    min_inliers: usize,
    ransac: RansacConfig,
    keypoints: KeypointDetector,
}

impl CopyMoveDetector {
    pub fn new(ratio_threshold: f64, ransac_threshold: f64) -> Result<Self> {
        let config = AnalysisConfig {
            ratio_threshold,
            ransac_threshold,
            ..AnalysisConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        if !(config.ratio_threshold > 0.0 && config.ratio_threshold <= 1.0) {
            return Err(ForensicsError::InvalidParameter(
                "Ratio threshold must be in (0, 1]".into(),
            ));
        }
        if !(config.ransac_threshold > 0.0) {
            return Err(ForensicsError::InvalidParameter(
                "RANSAC threshold must be positive".into(),
            ));
        }

        Ok(Self {
            ratio_threshold: config.ratio_threshold,
            min_match_distance: config.min_match_distance,
            min_matches: config.min_matches,
            min_inliers: config.min_inliers,
            ransac: RansacConfig {
                threshold: config.ransac_threshold,
                max_iterations: config.ransac_iterations,
                seed: config.ransac_seed,
                ..RansacConfig::default()
            },
            keypoints: KeypointDetector::new(
                config.fast_threshold,
                config.pyramid_levels,
                config.max_keypoints,
            ),
        })
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<CopyMoveResult> {
        self.detect_with_deadline(image, &Deadline::none())
    }

    pub fn detect_with_deadline(&self, image: &DynamicImage, deadline: &Deadline) -> Result<CopyMoveResult> {
        deadline.check(ForensicsError::CopyMoveAnalysisFailed)?;

        let gray = rgb_to_gray(&image.to_rgb8());
        if gray.width() == 0 || gray.height() == 0 {
            return Err(ForensicsError::CopyMoveAnalysisFailed(
                "cannot convert an empty image to grayscale".into(),
            ));
        }

        let (keypoints, descriptors) = self.keypoints.detect_and_describe(&gray);
        if keypoints.is_empty() {
            return Err(ForensicsError::CopyMoveAnalysisFailed("no keypoints found".into()));
        }

        deadline.check(ForensicsError::CopyMoveAnalysisFailed)?;

        let matches = self.self_match(&keypoints, &descriptors, deadline)?;
        let consensus = self.geometric_consensus(&matches, deadline)?;

        let (is_copy_move, confidence) = self.classify(matches.len(), consensus.inlier_count);

        log::debug!(
            "copy-move: {} keypoints, {} matches, {} inliers",
            keypoints.len(),
            matches.len(),
            consensus.inlier_count
        );

        Ok(CopyMoveResult {
            is_copy_move,
            confidence,
            match_count: matches.len(),
            inlier_count: consensus.inlier_count,
            keypoint_count: keypoints.len(),
            consensus,
            matches,
        })
    }

    /// Fires only on many matches that also agree on one transform.
    pub fn classify(&self, match_count: usize, inlier_count: usize) -> (bool, f64) {
        let is_copy_move = match_count > self.min_matches && inlier_count > self.min_inliers;
        let confidence = if is_copy_move {
            (inlier_count as f64 / 4.0 * 20.0).min(100.0)
        } else {
            0.0
        };
        (is_copy_move, confidence)
    }

    /// Two nearest neighbours of every descriptor among the other keypoints,
    /// filtered by the ratio test. The query is never its own candidate, and
    /// keypoints closer than `min_match_distance` to it are the same structure
    /// seen at another scale and are not candidates either.
    fn self_match(
        &self,
        keypoints: &[Keypoint],
        descriptors: &[Descriptor],
        deadline: &Deadline,
    ) -> Result<Vec<KeypointMatch>> {
        let n = keypoints.len();
        let min_dist_sq = self.min_match_distance * self.min_match_distance;

        let candidates = (0..n)
            .into_par_iter()
            .map(|i| -> Result<Option<KeypointMatch>> {
                if i % 32 == 0 {
                    deadline.check(ForensicsError::CopyMoveAnalysisFailed)?;
                }

                let query = &keypoints[i];
                let mut best: Option<(usize, f32)> = None;
                let mut second = f32::INFINITY;

                for j in 0..n {
                    if j == i {
                        continue;
                    }
                    let other = &keypoints[j];
                    let dx = (query.x - other.x) as f64;
                    let dy = (query.y - other.y) as f64;
                    if dx * dx + dy * dy < min_dist_sq {
                        continue;
                    }

                    let d = descriptors[i].distance(&descriptors[j]);
                    match best {
                        Some((_, best_d)) if d >= best_d => {
                            if d < second {
                                second = d;
                            }
                        }
                        Some((_, best_d)) => {
                            second = best_d;
                            best = Some((j, d));
                        }
                        None => best = Some((j, d)),
                    }
                }

                let Some((target, distance)) = best else {
                    return Ok(None);
                };
                if !second.is_finite() {
                    return Ok(None);
                }
                if (distance as f64) >= self.ratio_threshold * second as f64 {
                    return Ok(None);
                }

                let other = &keypoints[target];
                Ok(Some(KeypointMatch {
                    source_index: i,
                    target_index: target,
                    source: (query.x as f64, query.y as f64),
                    target: (other.x as f64, other.y as f64),
                    distance: distance as f64,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(candidates.into_iter().flatten().collect())
    }

    fn geometric_consensus(&self, matches: &[KeypointMatch], deadline: &Deadline) -> Result<GeometricConsensus> {
        if matches.len() < MIN_FIT_MATCHES {
            return Ok(GeometricConsensus::not_attempted());
        }

        let src = matches.iter().map(|m| m.source).collect::<Vec<Point>>();
        let dst = matches.iter().map(|m| m.target).collect::<Vec<Point>>();

        let fit = ransac_homography(&src, &dst, &self.ransac, deadline)?;

        Ok(match fit {
            Some(fit) => GeometricConsensus {
                inlier_count: fit.inlier_count(),
                transform_attempted: true,
                homography: Some(std::array::from_fn(|k| fit.homography[(k / 3, k % 3)])),
            },
            None => GeometricConsensus {
                inlier_count: 0,
                transform_attempted: true,
                homography: None,
            },
        })
    }
}
