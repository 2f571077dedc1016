use palette::{FromColor, Hsv, Srgb};

use super::color::Rgb;

/// Continuous hue from the normalized iteration count, fully saturated.
pub fn color_for(iterations: u32, modulus: f64) -> Rgb {
    let hue = f64::from(iterations) + 1.0 - modulus.abs().ln().ln() / 2f64.ln();
    let hue = if hue.is_finite() {
        hue.rem_euclid(360.0)
    } else {
        0.0
    };
    hsv_to_rgb(hue, 1.0, 1.0)
}

/// `hue` in degrees, `saturation`/`value` in `[0, 1]`.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let rgb = Srgb::<f64>::from_color(Hsv::new_srgb(hue, saturation, value));

    // truncating, not rounding
    Rgb::new(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}
