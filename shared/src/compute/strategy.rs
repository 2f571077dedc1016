use std::{fmt, str::FromStr, sync::Arc};

use log::{debug, error};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    graphics::{color::ColorTheme, shade},
    models::{canvas::Canvas, pixel::Pixel, render_job::RenderSettings},
};

use super::{escape::escape_time, mapping::Viewport, pool::EscapePool};

pub const DEFAULT_MAX_TASKS: usize = 100;

/// How a single process spreads the per-pixel work. Every strategy produces
/// the same canvas; only throughput differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    /// One task per pixel, no limit.
    Unbounded,
    /// One task per pixel, at most `max_tasks` in flight.
    Bounded { max_tasks: usize },
    /// Producer plus a pool sized to the available parallelism.
    #[default]
    Pooled,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => f.write_str("sequential"),
            Strategy::Unbounded => f.write_str("unbounded"),
            Strategy::Bounded { max_tasks } => write!(f, "bounded({max_tasks})"),
            Strategy::Pooled => f.write_str("pooled"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "unbounded" => Ok(Strategy::Unbounded),
            "bounded" => Ok(Strategy::Bounded {
                max_tasks: DEFAULT_MAX_TASKS,
            }),
            "pooled" => Ok(Strategy::Pooled),
            other => Err(format!(
                "unknown strategy '{other}', expected sequential, unbounded, bounded or pooled"
            )),
        }
    }
}

/// Renders the whole image in this process.
pub async fn render(settings: &RenderSettings, strategy: Strategy) -> Canvas {
    let viewport = settings.viewport();
    let mut canvas = Canvas::new(settings.width, settings.height);
    debug!(
        "Rendering {}x{} with the {} strategy",
        settings.width, settings.height, strategy
    );

    match strategy {
        Strategy::Sequential => render_sequential(settings, viewport, &mut canvas),
        Strategy::Unbounded => render_tasks(settings, viewport, None, &mut canvas).await,
        Strategy::Bounded { max_tasks } => {
            let permits = Arc::new(Semaphore::new(max_tasks.max(1)));
            render_tasks(settings, viewport, Some(permits), &mut canvas).await
        }
        Strategy::Pooled => render_pooled(settings, viewport, &mut canvas).await,
    }

    canvas
}

fn shade_pixel(viewport: Viewport, theme: ColorTheme, max_iterations: u32, index: u32) -> Pixel {
    let result = escape_time(viewport.to_coordinate(index), max_iterations);
    shade(theme, &result, max_iterations)
}

fn put(canvas: &mut Canvas, pixel: &Pixel) {
    if let Err(e) = canvas.put(pixel) {
        error!("Dropping pixel: {}", e);
    }
}

fn render_sequential(settings: &RenderSettings, viewport: Viewport, canvas: &mut Canvas) {
    for index in settings.full_partition().indices() {
        let pixel = shade_pixel(viewport, settings.color_theme, settings.max_iterations, index);
        put(canvas, &pixel);
    }
}

async fn render_tasks(
    settings: &RenderSettings,
    viewport: Viewport,
    permits: Option<Arc<Semaphore>>,
    canvas: &mut Canvas,
) {
    let theme = settings.color_theme;
    let max_iterations = settings.max_iterations;
    let mut tasks = JoinSet::new();

    for index in settings.full_partition().indices() {
        let permit = match &permits {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    error!("Semaphore closed: {}", e);
                    break;
                }
            },
            None => None,
        };
        tasks.spawn(async move {
            let pixel = shade_pixel(viewport, theme, max_iterations, index);
            drop(permit);
            pixel
        });

        // keep the set from holding every finished pixel until the end
        while let Some(done) = tasks.try_join_next() {
            collect(done, canvas);
        }
    }

    while let Some(done) = tasks.join_next().await {
        collect(done, canvas);
    }
}

fn collect(done: Result<Pixel, tokio::task::JoinError>, canvas: &mut Canvas) {
    match done {
        Ok(pixel) => put(canvas, &pixel),
        Err(e) => error!("Pixel task failed: {}", e),
    }
}

async fn render_pooled(settings: &RenderSettings, viewport: Viewport, canvas: &mut Canvas) {
    let mut results = EscapePool::with_available_parallelism().spawn(
        viewport,
        settings.full_partition(),
        settings.max_iterations,
    );

    while let Some(result) = results.recv().await {
        put(canvas, &shade(settings.color_theme, &result, settings.max_iterations));
    }
}
