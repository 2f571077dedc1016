use shared::{
    models::{canvas::CanvasError, render_job::SettingsError},
    networking::error::NetworkingError,
    sink::SinkError,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("invalid render settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("at least one worker is required")]
    NoWorkersRequired,

    #[error(transparent)]
    Networking(#[from] NetworkingError),

    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("only {registered} of {required} workers registered before the timeout")]
    RegistrationTimeout { registered: usize, required: usize },

    #[error("coordinator cancelled")]
    Cancelled,

    #[error("render task failed: {0}")]
    RenderTask(#[from] tokio::task::JoinError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
