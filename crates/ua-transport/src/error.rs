use crate::TypeTag;
use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("bad status {code} for {path}")]
    BadStatus { path: String, code: String },
    #[error("type mismatch on {path}: node holds {node}, write was {written}")]
    TypeMismatch {
        path: String,
        node: TypeTag,
        written: TypeTag,
    },
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("client is disconnected")]
    Disconnected,
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// True when the server reported that the addressed node does not exist.
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, TransportError::NodeNotFound(_))
    }
}
