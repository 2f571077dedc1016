use serde::{Deserialize, Serialize};

/// Outcome of the escape-time recurrence for a single [`Coordinate`].
///
/// `zr`/`zi` hold the last iterate, which the smooth colorings need.
/// `iterations` equals the iteration budget when the point never escaped.
///
/// [`Coordinate`]: crate::models::coordinate::Coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscapeResult {
    pub is_in_set: bool,
    pub iterations: u32,
    pub zr: f64,
    pub zi: f64,
    pub index: u32,
}

impl EscapeResult {
    pub fn modulus(&self) -> f64 {
        (self.zr * self.zr + self.zi * self.zi).sqrt()
    }
}
