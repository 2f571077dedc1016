use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};
use log::info;
use thiserror::Error;

use crate::models::canvas::Canvas;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("buffer does not hold a {width}x{height} RGBA image")]
    BufferSize { width: u32, height: u32 },

    #[error("quality must be within 1..=100, got {0}")]
    Quality(u8),
}

/// Destination for a finished canvas.
pub trait ImageSink {
    fn write(&self, canvas: &Canvas) -> Result<(), SinkError>;
}

/// Encodes to a file, format picked from the extension. JPEG honours
/// `quality`; extensions the `image` crate does not know fall back to JPEG.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    quality: u8,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, quality: u8) -> Result<Self, SinkError> {
        if !(1..=100).contains(&quality) {
            return Err(SinkError::Quality(quality));
        }
        Ok(Self {
            path: path.into(),
            quality,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSink for FileSink {
    fn write(&self, canvas: &Canvas) -> Result<(), SinkError> {
        let rgba = RgbaImage::from_raw(canvas.width(), canvas.height(), canvas.as_bytes().to_vec())
            .ok_or(SinkError::BufferSize {
                width: canvas.width(),
                height: canvas.height(),
            })?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        match ImageFormat::from_path(&self.path) {
            Ok(ImageFormat::Jpeg) | Err(_) => {
                let mut writer = BufWriter::new(File::create(&self.path)?);
                JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(&rgb)?;
            }
            Ok(format) => rgb.save_with_format(&self.path, format)?,
        }

        info!(
            "Wrote {}x{} image to {}",
            canvas.width(),
            canvas.height(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graphics::color::Rgb, models::pixel::Pixel};

    fn striped(width: u32, height: u32) -> Canvas {
        let mut canvas = Canvas::new(width, height);
        for index in 0..width * height {
            let shade = if index % 2 == 0 { 255 } else { 0 };
            canvas.put(&Pixel::new(index, Rgb::new(shade, 0, 0))).unwrap();
        }
        canvas
    }

    #[test]
    fn writes_a_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpeg");

        FileSink::new(&path, 90).unwrap().write(&striped(16, 8)).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn png_keeps_exact_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let canvas = striped(4, 4);

        FileSink::new(&path, 90).unwrap().write(&canvas).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        assert!(matches!(FileSink::new("x.jpeg", 0), Err(SinkError::Quality(0))));
        assert!(FileSink::new("x.jpeg", 101).is_err());
    }
}
