//! Error type for the engine boundary

use thiserror::Error;

/// Engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested payment is not known to the engine
    #[error("payment not found")]
    NotFound,

    /// Connection to the engine's backend services failed
    #[error("engine connection failed: {0}")]
    Connection(String),

    /// The engine rejected the request
    #[error("engine rejected the request: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the engine
    #[error("engine transport error: {0}")]
    Transport(String),
}
