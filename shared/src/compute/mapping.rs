use crate::models::{coordinate::Coordinate, partition::Partition};

/// Window onto the complex plane: image size, centre and zoom radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, center_x: f64, center_y: f64, radius: f64) -> Self {
        Self {
            width,
            height,
            center_x,
            center_y,
            radius,
        }
    }

    /// Maps a linear pixel index to its point on the complex plane.
    ///
    /// The pixel grid is top-left indexed; the plane is centred on
    /// `(center_x, center_y)` and `radius` wide, stretched by the aspect ratio
    /// on the real axis.
    pub fn to_coordinate(&self, index: u32) -> Coordinate {
        let width = f64::from(self.width);
        let height = f64::from(self.height);
        let aspect_ratio = height / width;

        let x = f64::from(index % self.width);
        let y = f64::from(index / self.width);

        let re = (((x * self.radius / width) - self.radius / 2.0) + self.center_x * aspect_ratio)
            / aspect_ratio;
        let im = -((y * self.radius / height) - self.radius / 2.0) + self.center_y;

        Coordinate::new(re, im, index)
    }

    pub fn coordinates(self, partition: Partition) -> impl Iterator<Item = Coordinate> {
        partition.indices().map(move |index| self.to_coordinate(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_image_corner_and_centre() {
        let viewport = Viewport::new(100, 100, 0.0, 0.0, 4.0);

        let corner = viewport.to_coordinate(0);
        assert_eq!((corner.re, corner.im), (-2.0, 2.0));

        let centre = viewport.to_coordinate(50 * 100 + 50);
        assert_eq!((centre.re, centre.im), (0.0, 0.0));
        assert_eq!(centre.index, 5050);
    }

    #[test]
    fn wide_image_is_stretched_on_the_real_axis() {
        let viewport = Viewport::new(200, 100, 0.0, 0.0, 4.0);
        let corner = viewport.to_coordinate(0);
        assert_eq!((corner.re, corner.im), (-4.0, 2.0));

        // last pixel of the first row
        let edge = viewport.to_coordinate(199);
        assert!((edge.re - 3.96).abs() < 1e-12);
        assert_eq!(edge.im, 2.0);
    }

    #[test]
    fn offset_centre_shifts_the_plane() {
        let viewport = Viewport::new(100, 100, -0.5, 0.25, 2.0);
        let corner = viewport.to_coordinate(0);
        assert_eq!((corner.re, corner.im), (-1.5, 1.25));

        let below = viewport.to_coordinate(100);
        assert!((below.im - 1.23).abs() < 1e-12);
        assert_eq!(below.re, -1.5);
    }

    #[test]
    fn coordinates_follow_the_partition() {
        let viewport = Viewport::new(10, 10, 0.0, 0.0, 4.0);
        let indices: Vec<u32> = viewport
            .coordinates(Partition::new(37, 41))
            .map(|c| c.index)
            .collect();
        assert_eq!(indices, vec![37, 38, 39, 40]);
    }
}
