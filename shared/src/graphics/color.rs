use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::models::escape_result::EscapeResult;

use super::{gradient, hue, palette};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Largest per-channel difference, a cheap distance for ramp checks.
    pub fn channel_distance(&self, other: &Rgb) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

/// Colouring algorithm applied to points that escaped.
///
/// Points inside the set are black whatever the theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTheme {
    BitShift,
    Palette,
    Hue,
    #[default]
    Gradient,
}

impl ColorTheme {
    pub const ALL: [ColorTheme; 4] = [
        ColorTheme::BitShift,
        ColorTheme::Palette,
        ColorTheme::Hue,
        ColorTheme::Gradient,
    ];

    pub fn colorize(&self, result: &EscapeResult, max_iterations: u32) -> Rgb {
        if result.is_in_set {
            return Rgb::BLACK;
        }

        match self {
            ColorTheme::BitShift => bit_shift(result.iterations, max_iterations),
            ColorTheme::Palette => palette::color_for(result.iterations),
            ColorTheme::Hue => hue::color_for(result.iterations, result.modulus()),
            ColorTheme::Gradient => gradient::color_for(result.iterations, result.modulus()),
        }
    }
}

impl fmt::Display for ColorTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorTheme::BitShift => "bitshift",
            ColorTheme::Palette => "palette",
            ColorTheme::Hue => "hue",
            ColorTheme::Gradient => "gradient",
        };
        f.write_str(name)
    }
}

impl FromStr for ColorTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "bitshift" | "bit-shift" => Ok(ColorTheme::BitShift),
            "2" | "palette" => Ok(ColorTheme::Palette),
            "3" | "hue" => Ok(ColorTheme::Hue),
            "4" | "gradient" => Ok(ColorTheme::Gradient),
            other => Err(format!(
                "unknown color theme '{other}', expected bitshift, palette, hue or gradient"
            )),
        }
    }
}

/// Scales `iterations / max_iterations` onto 24 bits and splits it into
/// channels, red being the most significant byte.
fn bit_shift(iterations: u32, max_iterations: u32) -> Rgb {
    let normalized = f64::from(iterations) / f64::from(max_iterations.max(1));
    let scaled = (normalized * f64::from(0x00ff_ffff)) as u32;

    Rgb::new(
        ((scaled & 0xff_0000) >> 16) as u8,
        ((scaled & 0x00_ff00) >> 8) as u8,
        (scaled & 0x00_00ff) as u8,
    )
}
