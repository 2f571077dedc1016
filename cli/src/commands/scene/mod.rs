use clap::Args;
use shared::{graphics::color::ColorTheme, models::render_job::RenderSettings};

/// 🌀 Scene parameters shared by every rendering command.
#[derive(Args, Debug)]
pub struct SceneArgs {
    /// 📏 Image width in pixels
    #[arg(long, value_name = "WIDTH", default_value_t = 100)]
    pub width: u32,

    /// 📐 Image height in pixels
    #[arg(long, value_name = "HEIGHT", default_value_t = 100)]
    pub height: u32,

    /// ↔️ Real part of the image center
    #[arg(long, value_name = "X", default_value_t = 0.0, allow_negative_numbers = true)]
    pub center_x: f64,

    /// ↕️ Imaginary part of the image center
    #[arg(long, value_name = "Y", default_value_t = 0.0, allow_negative_numbers = true)]
    pub center_y: f64,

    /// 🔭 Width of the viewed region of the complex plane
    #[arg(long, value_name = "RADIUS", default_value_t = 4.0)]
    pub radius: f64,

    /// 🔁 Iterations before a point counts as inside the set
    #[arg(long, value_name = "COUNT", default_value_t = 300)]
    pub max_iterations: u32,

    /// 🎨 Color theme
    ///
    /// One of bitshift, palette, hue or gradient (or 1 to 4).
    #[arg(long, value_name = "THEME", default_value_t = ColorTheme::Gradient)]
    pub theme: ColorTheme,
}

impl SceneArgs {
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            color_theme: self.theme,
            max_iterations: self.max_iterations,
            center_x: self.center_x,
            center_y: self.center_y,
            radius: self.radius,
            width: self.width,
            height: self.height,
        }
    }
}
