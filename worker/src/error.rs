use shared::networking::error::NetworkingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Networking(#[from] NetworkingError),

    #[error("registration failed after {attempts} attempts: {source}")]
    Registration {
        attempts: u32,
        #[source]
        source: NetworkingError,
    },

    #[error("render node cancelled")]
    Cancelled,
}

pub type WorkerResult<T> = Result<T, WorkerError>;
