use serde::{Deserialize, Serialize};

use crate::models::{
    coordinate::Coordinate, escape_result::EscapeResult, render_job::RenderJob,
    worker_record::WorkerRecord,
};

use super::result::NetworkingResult;

/// Every frame exchanged between coordinator and render nodes.
///
/// Serialized externally tagged, e.g. `{"Register":{"hostname":..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Node -> coordinator. Answered with `Ack` or `Error`.
    Register(WorkerRecord),
    /// Coordinator -> node. Answered with `Ack`.
    Configure(RenderJob),
    /// Coordinator -> node. The node streams `Result` frames for its stored
    /// job's partition, then closes.
    Compute,
    /// Coordinator -> node. Followed by `Coordinate` frames until the
    /// coordinator closes its send side; results stream back concurrently.
    ComputeStream,
    Coordinate(Coordinate),
    Result(EscapeResult),
    Ack,
    Error(String),
}

impl Message {
    pub fn to_json(&self) -> NetworkingResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(message: &str) -> NetworkingResult<Self> {
        Ok(serde_json::from_str(message)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Register(_) => "Register",
            Message::Configure(_) => "Configure",
            Message::Compute => "Compute",
            Message::ComputeStream => "ComputeStream",
            Message::Coordinate(_) => "Coordinate",
            Message::Result(_) => "Result",
            Message::Ack => "Ack",
            Message::Error(_) => "Error",
        }
    }
}
