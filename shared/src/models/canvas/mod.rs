use thiserror::Error;

use super::{partition::Partition, pixel::Pixel};

pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("pixel {index} is outside {start}..{end}")]
    OutOfRange { index: u32, start: u32, end: u32 },

    #[error("pixel {index} was already written")]
    AlreadyWritten { index: u32 },

    #[error("partitions must be ascending, contiguous and inside the canvas")]
    MisalignedPartitions,
}

/// RGBA output buffer, pixel `i` living at bytes `i*4..i*4+4`.
///
/// Unwritten pixels stay all-zero, i.e. transparent black. Every write sets
/// alpha to `0xff`, so a pixel can be written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Allocates `width * height` pixels. Pixel indices are u32, so only the
    /// first `u32::MAX` pixels of a larger canvas are addressable through
    /// [`Canvas::put`]; validated render settings never get that far.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    pub fn put(&mut self, pixel: &Pixel) -> Result<(), CanvasError> {
        let end = u32::try_from(self.pixel_count()).unwrap_or(u32::MAX);
        write_pixel(&mut self.pixels, 0, end, pixel)
    }

    pub fn rgba_at(&self, index: u32) -> Option<[u8; 4]> {
        let offset = index as usize * BYTES_PER_PIXEL;
        self.pixels
            .get(offset..offset + BYTES_PER_PIXEL)
            .and_then(|bytes| bytes.try_into().ok())
    }

    /// Number of pixels whose alpha channel has been set.
    pub fn written(&self) -> usize {
        self.pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .filter(|rgba| rgba[3] != 0)
            .count()
    }

    /// Splits the buffer into one disjoint mutable region per partition.
    ///
    /// `partitions` must be ascending and contiguous starting at 0 and may not
    /// run past the end of the canvas.
    pub fn regions_mut(&mut self, partitions: &[Partition]) -> Result<Vec<Region<'_>>, CanvasError> {
        let mut expected = 0;
        for partition in partitions {
            if partition.start != expected || partition.end < partition.start {
                return Err(CanvasError::MisalignedPartitions);
            }
            expected = partition.end;
        }
        if u64::from(expected) > self.pixel_count() {
            return Err(CanvasError::MisalignedPartitions);
        }

        let mut rest: &mut [u8] = &mut self.pixels;
        let mut regions = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let (head, tail) =
                std::mem::take(&mut rest).split_at_mut(partition.len() as usize * BYTES_PER_PIXEL);
            regions.push(Region {
                partition: *partition,
                bytes: head,
            });
            rest = tail;
        }
        Ok(regions)
    }
}

/// A borrowed slice of a [`Canvas`] covering exactly one partition.
#[derive(Debug)]
pub struct Region<'a> {
    partition: Partition,
    bytes: &'a mut [u8],
}

impl Region<'_> {
    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn put(&mut self, pixel: &Pixel) -> Result<(), CanvasError> {
        write_pixel(self.bytes, self.partition.start, self.partition.end, pixel)
    }
}

fn write_pixel(bytes: &mut [u8], start: u32, end: u32, pixel: &Pixel) -> Result<(), CanvasError> {
    if pixel.index < start || pixel.index >= end {
        return Err(CanvasError::OutOfRange {
            index: pixel.index,
            start,
            end,
        });
    }
    let offset = (pixel.index - start) as usize * BYTES_PER_PIXEL;
    let slot = &mut bytes[offset..offset + BYTES_PER_PIXEL];
    if slot[3] != 0 {
        return Err(CanvasError::AlreadyWritten { index: pixel.index });
    }
    slot.copy_from_slice(&pixel.rgba());
    Ok(())
}
