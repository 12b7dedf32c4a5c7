use siphon_graph::{EndpointId, ReadFailure, Role};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph could not be read. The previously held snapshot is kept.
    #[error("snapshot read failed: {0}")]
    Read(#[from] ReadFailure),

    #[error("{endpoint} is not an {expected:?} endpoint")]
    WrongDirection { endpoint: EndpointId, expected: Role },

    #[error("configuration: {0}")]
    Config(String),
}
