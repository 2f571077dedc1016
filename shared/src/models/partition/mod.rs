use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Half-open range of linear pixel indices handed to one render node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub start: u32,
    pub end: u32,
}

impl Partition {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: u32) -> bool {
        self.start <= index && index < self.end
    }

    pub fn indices(&self) -> Range<u32> {
        self.start..self.end
    }
}

/// Splits `[0, total)` into `parts` contiguous, ascending partitions.
///
/// The remainder of `total / parts` is spread one pixel at a time over the
/// leading partitions, so the union always covers every index exactly once.
pub fn partition(total: u32, parts: usize) -> Vec<Partition> {
    if parts == 0 {
        return Vec::new();
    }

    let parts_u32 = parts as u32;
    let base = total / parts_u32;
    let remainder = total % parts_u32;

    let mut start = 0;
    (0..parts_u32)
        .map(|i| {
            let len = base + u32::from(i < remainder);
            let slice = Partition::new(start, start + len);
            start += len;
            slice
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{partition, Partition};

    fn assert_covers(total: u32, parts: usize) {
        let slices = partition(total, parts);
        assert_eq!(slices.len(), parts);

        let mut next = 0;
        for slice in &slices {
            assert_eq!(slice.start, next, "gap or overlap at {next} ({total}/{parts})");
            next = slice.end;
        }
        assert_eq!(next, total);

        let sizes: Vec<u32> = slices.iter().map(Partition::len).collect();
        let max = sizes.iter().max().copied().unwrap_or(0);
        let min = sizes.iter().min().copied().unwrap_or(0);
        assert!(max - min <= 1);
    }

    #[test]
    fn even_split_matches_two_worker_farm() {
        let slices = partition(100 * 100, 2);
        assert_eq!(slices, vec![Partition::new(0, 5000), Partition::new(5000, 10000)]);
    }

    #[test]
    fn remainder_is_not_dropped() {
        let slices = partition(10, 3);
        assert_eq!(
            slices,
            vec![Partition::new(0, 4), Partition::new(4, 7), Partition::new(7, 10)]
        );
    }

    #[test]
    fn covers_every_index_for_many_shapes() {
        for (width, height) in [(1, 1), (7, 3), (100, 100), (33, 17), (640, 480), (1, 997)] {
            for parts in 1..=12 {
                assert_covers(width * height, parts);
            }
        }
    }

    #[test]
    fn more_parts_than_pixels_yields_empty_tails() {
        let slices = partition(2, 4);
        assert_eq!(slices.iter().filter(|p| p.is_empty()).count(), 2);
        assert_covers(2, 4);
    }

    #[test]
    fn zero_parts_yields_nothing() {
        assert!(partition(100, 0).is_empty());
    }
}
