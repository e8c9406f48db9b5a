use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::{SeedableRng, rngs::StdRng, seq::index::sample};

use crate::{
    deadline::Deadline,
    error::{ForensicsError, Result},
};

pub type Point = (f64, f64);

const SAMPLE_SIZE: usize = 4;

#[derive(Debug, Clone)]
pub struct RansacConfig {
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RansacFit {
    pub homography: Matrix3<f64>,
    pub inliers: Vec<bool>,
}

impl RansacFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }
}

/// Direct linear transform on Hartley-normalized points. Needs at least four
/// correspondences; returns `None` for degenerate configurations.
pub fn fit_homography(src: &[Point], dst: &[Point]) -> Option<Matrix3<f64>> {
    if src.len() < SAMPLE_SIZE || src.len() != dst.len() {
        return None;
    }

    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;

    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (i, (&s, &d)) in src.iter().zip(dst.iter()).enumerate() {
        let (x, y) = apply(&t_src, s)?;
        let (u, v) = apply(&t_dst, d)?;

        let r = 2 * i;
        a[(r, 0)] = -x;
        a[(r, 1)] = -y;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = u * x;
        a[(r, 7)] = u * y;
        a[(r, 8)] = u;

        a[(r + 1, 3)] = -x;
        a[(r + 1, 4)] = -y;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = v * x;
        a[(r + 1, 7)] = v * y;
        a[(r + 1, 8)] = v;
    }

    // null vector of A = eigenvector of AᵀA with the smallest eigenvalue
    let eigen = (a.transpose() * &a).symmetric_eigen();
    let (smallest, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .fold((0usize, f64::INFINITY), |best, (i, &v)| if v < best.1 { (i, v) } else { best });
    let h = eigen.eigenvectors.column(smallest);

    let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    let homography = t_dst.try_inverse()? * normalized * t_src;

    let scale = homography[(2, 2)];
    if scale.abs() < 1e-12 || !scale.is_finite() {
        return None;
    }

    Some(homography / scale)
}

pub fn reprojection_error(h: &Matrix3<f64>, src: Point, dst: Point) -> f64 {
    match apply(h, src) {
        Some((x, y)) => ((x - dst.0).powi(2) + (y - dst.1).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

/// Robust homography fit. Returns `Ok(None)` when no non-degenerate model
/// could be estimated at all.
pub fn ransac_homography(
    src: &[Point],
    dst: &[Point],
    config: &RansacConfig,
    deadline: &Deadline,
) -> Result<Option<RansacFit>> {
    let n = src.len();
    if n < SAMPLE_SIZE || n != dst.len() {
        return Ok(None);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<RansacFit> = None;
    let mut best_count = 0usize;
    let mut required = config.max_iterations;
    let mut iteration = 0usize;

    while iteration < required.min(config.max_iterations) {
        iteration += 1;
        if iteration % 64 == 0 {
            deadline.check(ForensicsError::CopyMoveAnalysisFailed)?;
        }

        let picks = sample(&mut rng, n, SAMPLE_SIZE).into_vec();
        let sample_src = picks.iter().map(|&i| src[i]).collect::<Vec<_>>();
        let sample_dst = picks.iter().map(|&i| dst[i]).collect::<Vec<_>>();

        if is_degenerate(&sample_src) || is_degenerate(&sample_dst) {
            continue;
        }

        let Some(h) = fit_homography(&sample_src, &sample_dst) else {
            continue;
        };

        let inliers = classify(&h, src, dst, config.threshold);
        let count = inliers.iter().filter(|&&i| i).count();

        if count > best_count {
            best_count = count;
            best = Some(RansacFit { homography: h, inliers });
            required = adaptive_iterations(count, n, config.confidence);
        }
    }

    deadline.check(ForensicsError::CopyMoveAnalysisFailed)?;

    Ok(best.map(|fit| refine(fit, src, dst, config.threshold)))
}

/// Refit on the consensus set; kept only if it does not lose inliers.
fn refine(fit: RansacFit, src: &[Point], dst: &[Point], threshold: f64) -> RansacFit {
    let (in_src, in_dst): (Vec<Point>, Vec<Point>) = src
        .iter()
        .zip(dst.iter())
        .zip(fit.inliers.iter())
        .filter(|(_, inlier)| **inlier)
        .map(|((&s, &d), _)| (s, d))
        .unzip();

    let Some(h) = fit_homography(&in_src, &in_dst) else {
        return fit;
    };

    let inliers = classify(&h, src, dst, threshold);
    let refined = RansacFit { homography: h, inliers };
    if refined.inlier_count() >= fit.inlier_count() {
        refined
    } else {
        fit
    }
}

fn classify(h: &Matrix3<f64>, src: &[Point], dst: &[Point], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst.iter())
        .map(|(&s, &d)| reprojection_error(h, s, d) <= threshold)
        .collect()
}

fn adaptive_iterations(inliers: usize, total: usize, confidence: f64) -> usize {
    let ratio = inliers as f64 / total as f64;
    let p_good = ratio.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return usize::MAX;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    needed.ceil().max(1.0) as usize
}

/// Any three of the four points (nearly) collinear.
fn is_degenerate(points: &[Point]) -> bool {
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            for k in (j + 1)..points.len() {
                let (a, b, c) = (points[i], points[j], points[k]);
                let area = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
                if area.abs() < 1e-3 {
                    return true;
                }
            }
        }
    }
    false
}

fn normalizing_transform(points: &[Point]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    if mean_dist < 1e-9 {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply(h: &Matrix3<f64>, p: Point) -> Option<Point> {
    let v = h * Vector3::new(p.0, p.1, 1.0);
    if v.z.abs() < 1e-12 {
        return None;
    }
    Some((v.x / v.z, v.y / v.z))
}
