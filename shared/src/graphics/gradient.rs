//! Smooth "Ultra Fractal" style gradient.
//!
//! The ramp is interpolated in Oklab so the brightness steps between
//! keypoints look even, and is built once on first use.

use std::sync::OnceLock;

use palette::{FromColor, Mix, Oklab, Srgb};

use super::color::Rgb;

pub const RAMP_SIZE: usize = 2048;

const SCALE: f64 = 256.0;

const KEYPOINTS: [(f64, Rgb); 6] = [
    (0.0, Rgb::new(0, 7, 100)),
    (0.16, Rgb::new(32, 107, 203)),
    (0.42, Rgb::new(237, 255, 255)),
    (0.6425, Rgb::new(255, 170, 0)),
    (0.8575, Rgb::new(0, 2, 0)),
    (1.0, Rgb::new(0, 7, 100)),
];

static RAMP: OnceLock<Vec<Rgb>> = OnceLock::new();

pub fn ramp() -> &'static [Rgb] {
    RAMP.get_or_init(build_ramp)
}

pub fn color_for(iterations: u32, modulus: f64) -> Rgb {
    ramp()[ramp_index(iterations, modulus)]
}

/// Continuous escape count: `ln(ln|z| · log2 e) · log2 e`.
pub fn smoothed(modulus: f64) -> f64 {
    let log2_e = std::f64::consts::LOG2_E;
    (modulus.ln() * log2_e).ln() * log2_e
}

pub fn ramp_index(iterations: u32, modulus: f64) -> usize {
    let position = (f64::from(iterations) + 1.0 - smoothed(modulus)).sqrt() * SCALE;
    if !position.is_finite() || position < 0.0 {
        return 0;
    }
    position as usize % RAMP_SIZE
}

fn build_ramp() -> Vec<Rgb> {
    let keypoints: Vec<(f64, Oklab<f64>)> = KEYPOINTS
        .iter()
        .map(|(position, color)| (*position, to_oklab(*color)))
        .collect();

    // stored back to front
    let mut ramp = vec![Rgb::BLACK; RAMP_SIZE];
    for y in 0..RAMP_SIZE {
        let t = y as f64 / RAMP_SIZE as f64;
        ramp[RAMP_SIZE - 1 - y] = from_oklab(interpolate(&keypoints, t));
    }
    ramp
}

fn interpolate(keypoints: &[(f64, Oklab<f64>)], t: f64) -> Oklab<f64> {
    for pair in keypoints.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if start <= t && t <= end {
            return from.mix(to, (t - start) / (end - start));
        }
    }
    keypoints[keypoints.len() - 1].1
}

fn to_oklab(color: Rgb) -> Oklab<f64> {
    Oklab::from_color(Srgb::new(color.r, color.g, color.b).into_format::<f64>())
}

fn from_oklab(color: Oklab<f64>) -> Rgb {
    let srgb: Srgb<u8> = Srgb::<f64>::from_color(color).into_format();
    Rgb::new(srgb.red, srgb.green, srgb.blue)
}
