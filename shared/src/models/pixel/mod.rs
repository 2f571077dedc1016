use serde::{Deserialize, Serialize};

use crate::graphics::color::Rgb;

/// Final colour for one pixel index; the unit written into a [`Canvas`].
///
/// [`Canvas`]: crate::models::canvas::Canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub index: u32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub fn new(index: u32, color: Rgb) -> Self {
        Self {
            index,
            r: color.r,
            g: color.g,
            b: color.b,
        }
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xff]
    }
}
