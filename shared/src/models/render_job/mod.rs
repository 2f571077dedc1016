use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{compute::mapping::Viewport, graphics::color::ColorTheme};

use super::partition::Partition;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("image of {width}x{height} exceeds the addressable pixel range")]
    ImageTooLarge { width: u32, height: u32 },

    #[error("max iterations must be at least 1")]
    NoIterations,

    #[error("radius must be finite and positive, got {0}")]
    InvalidRadius(f64),

    #[error("center must be finite, got ({0}, {1})")]
    InvalidCenter(f64, f64),
}

/// Everything needed to render the whole image, independent of how the work
/// is split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub color_theme: ColorTheme,
    pub max_iterations: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            color_theme: ColorTheme::Gradient,
            max_iterations: 300,
            center_x: 0.0,
            center_y: 0.0,
            radius: 4.0,
            width: 100,
            height: 100,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::EmptyImage {
                width: self.width,
                height: self.height,
            });
        }
        // Buffer offsets are `index * 4`, which must fit in a u32 index space.
        if u64::from(self.width) * u64::from(self.height) > u64::from(u32::MAX / 4) {
            return Err(SettingsError::ImageTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_iterations == 0 {
            return Err(SettingsError::NoIterations);
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(SettingsError::InvalidRadius(self.radius));
        }
        if !self.center_x.is_finite() || !self.center_y.is_finite() {
            return Err(SettingsError::InvalidCenter(self.center_x, self.center_y));
        }
        Ok(())
    }

    /// Only meaningful for settings that passed [`RenderSettings::validate`],
    /// which keeps the product inside u32.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(
            self.width,
            self.height,
            self.center_x,
            self.center_y,
            self.radius,
        )
    }

    pub fn full_partition(&self) -> Partition {
        Partition::new(0, self.pixel_count())
    }

    pub fn job(&self, partition: Partition) -> RenderJob {
        RenderJob {
            settings: *self,
            partition_start: partition.start,
            partition_end: partition.end,
        }
    }
}

/// The unit of configuration sent to a render node: the scene plus the
/// half-open pixel range the node is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    #[serde(flatten)]
    pub settings: RenderSettings,
    pub partition_start: u32,
    pub partition_end: u32,
}

impl RenderJob {
    pub fn partition(&self) -> Partition {
        Partition::new(self.partition_start, self.partition_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert_eq!(RenderSettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_settings() {
        let base = RenderSettings::default();

        let empty = RenderSettings { width: 0, ..base };
        assert!(matches!(empty.validate(), Err(SettingsError::EmptyImage { .. })));

        let no_iterations = RenderSettings {
            max_iterations: 0,
            ..base
        };
        assert_eq!(no_iterations.validate(), Err(SettingsError::NoIterations));

        let flat = RenderSettings { radius: 0.0, ..base };
        assert_eq!(flat.validate(), Err(SettingsError::InvalidRadius(0.0)));

        let lost = RenderSettings {
            center_x: f64::NAN,
            ..base
        };
        assert!(matches!(lost.validate(), Err(SettingsError::InvalidCenter(..))));

        let huge = RenderSettings {
            width: 1 << 16,
            height: 1 << 16,
            ..base
        };
        assert!(matches!(huge.validate(), Err(SettingsError::ImageTooLarge { .. })));
    }

    #[test]
    fn job_serializes_flat() {
        let job = RenderSettings::default().job(Partition::new(0, 5000));
        let value = serde_json::to_value(job).unwrap();
        assert_eq!(value["width"], 100);
        assert_eq!(value["partition_end"], 5000);
        assert_eq!(value["color_theme"], "Gradient");

        let back: RenderJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
        assert_eq!(back.partition(), Partition::new(0, 5000));
    }
}
