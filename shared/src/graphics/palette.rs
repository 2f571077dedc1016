use super::color::Rgb;

const PALETTE: [Rgb; 16] = [
    Rgb::new(66, 30, 15),
    Rgb::new(25, 7, 26),
    Rgb::new(9, 1, 47),
    Rgb::new(4, 4, 73),
    Rgb::new(0, 7, 100),
    Rgb::new(12, 44, 138),
    Rgb::new(24, 82, 177),
    Rgb::new(57, 125, 209),
    Rgb::new(134, 181, 229),
    Rgb::new(211, 236, 248),
    Rgb::new(241, 233, 191),
    Rgb::new(248, 201, 95),
    Rgb::new(255, 170, 0),
    Rgb::new(204, 128, 0),
    Rgb::new(153, 87, 0),
    Rgb::new(106, 52, 3),
];

pub fn color_for(iterations: u32) -> Rgb {
    PALETTE[iterations as usize % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_by_iteration_modulo_length() {
        assert_eq!(color_for(0), Rgb::new(66, 30, 15));
        assert_eq!(color_for(15), Rgb::new(106, 52, 3));
        assert_eq!(color_for(16), color_for(0));
    }
}
