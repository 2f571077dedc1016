use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Squared modulus, `re² + im²`.
    pub fn arg_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    pub fn norm(self) -> f64 {
        self.arg_sq().sqrt()
    }

    pub fn square(self) -> Self {
        self * self
    }
}

impl std::ops::Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl std::ops::Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl std::ops::Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Complex {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Complex;

    #[test]
    fn square_matches_expanded_form() {
        let z = Complex::new(1.5, -0.25);
        let sq = z.square();
        assert_eq!(sq.re, 1.5 * 1.5 - 0.25 * 0.25);
        assert_eq!(sq.im, 2.0 * 1.5 * -0.25);
    }

    #[test]
    fn norm_of_three_four_is_five() {
        let z = Complex::new(3.0, 4.0);
        assert_eq!(z.arg_sq(), 25.0);
        assert_eq!(z.norm(), 5.0);
        assert_eq!(z - z, Complex::new(0.0, 0.0));
    }
}
