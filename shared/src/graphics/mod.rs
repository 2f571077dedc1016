//! Colorization of escape results.

pub mod color;
pub mod gradient;
pub mod hue;
pub mod palette;

use crate::models::{escape_result::EscapeResult, pixel::Pixel};

use self::color::ColorTheme;

/// Turns an escape result into the pixel written at its index.
pub fn shade(theme: ColorTheme, result: &EscapeResult, max_iterations: u32) -> Pixel {
    Pixel::new(result.index, theme.colorize(result, max_iterations))
}
