use complex_rs::Complex;

use crate::models::{coordinate::Coordinate, escape_result::EscapeResult};

/// `|z|²` beyond which the orbit is known to diverge.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Iterates `z = z² + c` starting from `z = c`.
///
/// Exits as soon as `|z|² > 4`, reporting the iteration at which that was
/// observed, or after `max_iterations` steps with the point counted as inside
/// the set.
pub fn escape_time(coordinate: Coordinate, max_iterations: u32) -> EscapeResult {
    let c = Complex::new(coordinate.re, coordinate.im);
    let mut z = c;

    for iteration in 0..max_iterations {
        if z.arg_sq() > ESCAPE_RADIUS_SQ {
            return EscapeResult {
                is_in_set: false,
                iterations: iteration,
                zr: z.re,
                zi: z.im,
                index: coordinate.index,
            };
        }
        z = z.square() + c;
    }

    EscapeResult {
        is_in_set: true,
        iterations: max_iterations,
        zr: z.re,
        zi: z.im,
        index: coordinate.index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_never_escapes() {
        let result = escape_time(Coordinate::new(0.0, 0.0, 7), 300);
        assert!(result.is_in_set);
        assert_eq!(result.iterations, 300);
        assert_eq!(result.index, 7);
    }

    #[test]
    fn far_point_escapes_immediately() {
        let result = escape_time(Coordinate::new(2.0, 2.0, 0), 300);
        assert!(!result.is_in_set);
        assert!(result.iterations <= 1);
        assert_eq!((result.zr, result.zi), (2.0, 2.0));
    }

    #[test]
    fn boundary_point_takes_a_few_steps() {
        // c = 1: 1, 2, 5 -> |z|² = 25 at the third check
        let result = escape_time(Coordinate::new(1.0, 0.0, 0), 300);
        assert!(!result.is_in_set);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.zr, 5.0);
    }

    #[test]
    fn cycle_of_period_two_stays_bounded() {
        let result = escape_time(Coordinate::new(-1.0, 0.0, 0), 50);
        assert!(result.is_in_set);
    }
}
