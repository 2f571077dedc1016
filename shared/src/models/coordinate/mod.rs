use serde::{Deserialize, Serialize};

/// A point on the complex plane together with the linear pixel index it was
/// mapped from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub re: f64,
    pub im: f64,
    pub index: u32,
}

impl Coordinate {
    pub fn new(re: f64, im: f64, index: u32) -> Self {
        Self { re, im, index }
    }
}
