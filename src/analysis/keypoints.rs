//! Oriented, multi-scale keypoints with gradient-histogram descriptors.
//!
//! Corners come from FAST-9 on every level of a halving pyramid. Each corner
//! is assigned a dominant gradient orientation, and its descriptor is a 4x4
//! grid of 8-bin orientation histograms sampled in that rotated frame, so two
//! copies of a patch yield the same descriptor regardless of where (or at what
//! rotation) they sit in the image.

use std::f32::consts::PI;

use image::GrayImage;
use imageproc::corners::corners_fast9;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::image_utils::{build_pyramid, pixel_clamped};

pub const DESCRIPTOR_LEN: usize = 128;

const PATCH_RADIUS: u32 = 8;
const ORIENTATION_BINS: usize = 36;
const GRID: usize = 4;
const CELL_BINS: usize = 8;
const NMS_RADIUS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Position in base-image coordinates.
    pub x: f32,
    pub y: f32,
    pub level: usize,
    pub orientation: f32,
    pub response: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor(pub [f32; DESCRIPTOR_LEN]);

impl Descriptor {
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

pub struct KeypointDetector {
    fast_threshold: u8,
    levels: usize,
    max_keypoints: usize,
}

impl KeypointDetector {
    pub fn new(fast_threshold: u8, levels: usize, max_keypoints: usize) -> Self {
        Self {
            fast_threshold,
            levels: levels.max(1),
            max_keypoints,
        }
    }

    pub fn detect_and_describe(&self, gray: &GrayImage) -> (Vec<Keypoint>, Vec<Descriptor>) {
        let pyramid = build_pyramid(gray, self.levels, PATCH_RADIUS * 4);

        let mut candidates = Vec::new();
        for (level, image) in pyramid.iter().enumerate() {
            candidates.extend(
                self.detect_level(image)
                    .into_iter()
                    .map(|(x, y, score)| (level, x, y, score)),
            );
        }

        // strongest first, position as tie-break so runs are reproducible
        candidates.sort_by(|a, b| {
            b.3.total_cmp(&a.3)
                .then(a.0.cmp(&b.0))
                .then(a.2.cmp(&b.2))
                .then(a.1.cmp(&b.1))
        });
        candidates.truncate(self.max_keypoints);

        let described = candidates
            .par_iter()
            .map(|&(level, x, y, score)| {
                let image = &pyramid[level];
                let orientation = dominant_orientation(image, x, y);
                let descriptor = describe(image, x, y, orientation);
                let factor = (1u32 << level) as f32;
                let keypoint = Keypoint {
                    x: x as f32 * factor,
                    y: y as f32 * factor,
                    level,
                    orientation,
                    response: score,
                };
                (keypoint, descriptor)
            })
            .collect::<Vec<_>>();

        described.into_iter().unzip()
    }

    /// FAST corners far enough from the border for a full patch, thinned by
    /// greedy non-maximum suppression.
    fn detect_level(&self, image: &GrayImage) -> Vec<(u32, u32, f32)> {
        let (width, height) = image.dimensions();
        if width <= 2 * PATCH_RADIUS + 2 || height <= 2 * PATCH_RADIUS + 2 {
            return Vec::new();
        }

        let mut corners = corners_fast9(image, self.fast_threshold)
            .into_iter()
            .filter(|c| {
                c.x > PATCH_RADIUS
                    && c.y > PATCH_RADIUS
                    && c.x < width - PATCH_RADIUS - 1
                    && c.y < height - PATCH_RADIUS - 1
            })
            .collect::<Vec<_>>();

        corners.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });

        let mut taken = vec![false; (width * height) as usize];
        let mut kept = Vec::new();

        for corner in corners {
            let (cx, cy) = (corner.x as i64, corner.y as i64);
            let mut suppressed = false;

            'scan: for dy in -NMS_RADIUS..=NMS_RADIUS {
                for dx in -NMS_RADIUS..=NMS_RADIUS {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    if taken[(ny as u32 * width + nx as u32) as usize] {
                        suppressed = true;
                        break 'scan;
                    }
                }
            }

            if !suppressed {
                taken[(corner.y * width + corner.x) as usize] = true;
                kept.push((corner.x, corner.y, corner.score));
            }
        }

        kept
    }
}

fn gradient(image: &GrayImage, x: i64, y: i64) -> (f32, f32) {
    let gx = pixel_clamped(image, x + 1, y) - pixel_clamped(image, x - 1, y);
    let gy = pixel_clamped(image, x, y + 1) - pixel_clamped(image, x, y - 1);
    (gx as f32, gy as f32)
}

fn dominant_orientation(image: &GrayImage, x: u32, y: u32) -> f32 {
    let radius = PATCH_RADIUS as i64;
    let sigma = PATCH_RADIUS as f32 / 2.0;
    let mut histogram = [0.0f32; ORIENTATION_BINS];

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 > (radius * radius) as f32 {
                continue;
            }
            let (gx, gy) = gradient(image, x as i64 + dx, y as i64 + dy);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }
            let angle = gy.atan2(gx).rem_euclid(2.0 * PI);
            let bin = ((angle / (2.0 * PI)) * ORIENTATION_BINS as f32) as usize % ORIENTATION_BINS;
            histogram[bin] += magnitude * (-r2 / (2.0 * sigma * sigma)).exp();
        }
    }

    let (peak, _) = histogram
        .iter()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });

    (peak as f32 + 0.5) * 2.0 * PI / ORIENTATION_BINS as f32
}

fn describe(image: &GrayImage, x: u32, y: u32, orientation: f32) -> Descriptor {
    let (sin, cos) = orientation.sin_cos();
    let radius = PATCH_RADIUS as f32;
    let cell = 2.0 * radius / GRID as f32;
    let sigma = radius;
    let mut values = [0.0f32; DESCRIPTOR_LEN];

    let side = 2 * PATCH_RADIUS;
    for j in 0..side {
        for i in 0..side {
            let u = i as f32 - radius + 0.5;
            let v = j as f32 - radius + 0.5;

            let sx = x as f32 + cos * u - sin * v;
            let sy = y as f32 + sin * u + cos * v;
            let (gx, gy) = gradient(image, sx.round() as i64, sy.round() as i64);

            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude == 0.0 {
                continue;
            }

            let relative = (gy.atan2(gx) - orientation).rem_euclid(2.0 * PI);
            let bin = ((relative / (2.0 * PI)) * CELL_BINS as f32) as usize % CELL_BINS;

            let cx = (((u + radius) / cell) as usize).min(GRID - 1);
            let cy = (((v + radius) / cell) as usize).min(GRID - 1);

            let weight = (-(u * u + v * v) / (2.0 * sigma * sigma)).exp();
            values[(cy * GRID + cx) * CELL_BINS + bin] += magnitude * weight;
        }
    }

    normalize(&mut values);
    for v in values.iter_mut() {
        *v = v.min(0.2);
    }
    normalize(&mut values);

    Descriptor(values)
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}
