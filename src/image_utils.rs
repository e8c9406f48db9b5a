use image::{GrayImage, Luma, RgbImage, imageops::FilterType};
use ndarray::Array3;

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum = 0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
        gray.put_pixel(x, y, Luma([lum.round().clamp(0.0, 255.0) as u8]));
    }

    gray
}

/// Hue, saturation and value planes in the 8-bit convention: hue is halved to
/// fit [0, 180), saturation and value span [0, 255].
pub fn rgb_to_hsv_planes(image: &RgbImage) -> (GrayImage, GrayImage, GrayImage) {
    let (width, height) = image.dimensions();
    let mut hue = GrayImage::new(width, height);
    let mut sat = GrayImage::new(width, height);
    let mut val = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let r = pixel[0] as f64;
        let g = pixel[1] as f64;
        let b = pixel[2] as f64;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

        let mut h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (g - b) / delta
        } else if max == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        if h < 0.0 {
            h += 360.0;
        }

        let h8 = (h / 2.0).round();
        let h8 = if h8 >= 180.0 { 0.0 } else { h8 };

        hue.put_pixel(x, y, Luma([h8 as u8]));
        sat.put_pixel(x, y, Luma([s.round().clamp(0.0, 255.0) as u8]));
        val.put_pixel(x, y, Luma([max as u8]));
    }

    (hue, sat, val)
}

/// BT.601 luma with chroma planes offset by 128.
pub fn rgb_to_ycrcb_planes(image: &RgbImage) -> (GrayImage, GrayImage, GrayImage) {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    let mut cr = GrayImage::new(width, height);
    let mut cb = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let r = pixel[0] as f64;
        let g = pixel[1] as f64;
        let b = pixel[2] as f64;

        let y_val = 0.299 * r + 0.587 * g + 0.114 * b;
        let cr_val = (r - y_val) * 0.713 + 128.0;
        let cb_val = (b - y_val) * 0.564 + 128.0;

        luma.put_pixel(x, y, Luma([y_val.round().clamp(0.0, 255.0) as u8]));
        cr.put_pixel(x, y, Luma([cr_val.round().clamp(0.0, 255.0) as u8]));
        cb.put_pixel(x, y, Luma([cb_val.round().clamp(0.0, 255.0) as u8]));
    }

    (luma, cr, cb)
}

/// Per-channel absolute difference as a (height, width, 3) array.
pub fn abs_difference(a: &RgbImage, b: &RgbImage) -> Array3<f64> {
    let (width, height) = a.dimensions();
    let mut diff = Array3::zeros((height as usize, width as usize, 3));

    for (x, y, pa) in a.enumerate_pixels() {
        let pb = b.get_pixel(x, y);
        for c in 0..3 {
            diff[[y as usize, x as usize, c]] = (pa[c] as i32 - pb[c] as i32).abs() as f64;
        }
    }

    diff
}

/// Halving pyramid starting at the input. Stops early once a level would drop
/// below `min_side` pixels.
pub fn build_pyramid(image: &GrayImage, levels: usize, min_side: u32) -> Vec<GrayImage> {
    let mut pyramid = vec![image.clone()];

    for _ in 1..levels {
        let Some(prev) = pyramid.last() else { break };
        let (w, h) = (prev.width() / 2, prev.height() / 2);
        if w < min_side || h < min_side {
            break;
        }
        let next = image::imageops::resize(prev, w, h, FilterType::Triangle);
        pyramid.push(next);
    }

    pyramid
}

/// Clamped-border pixel fetch as f64.
pub fn pixel_clamped(image: &GrayImage, x: i64, y: i64) -> f64 {
    let cx = x.clamp(0, image.width() as i64 - 1) as u32;
    let cy = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(cx, cy)[0] as f64
}
