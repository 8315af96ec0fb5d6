use crate::pins::PinClass;
use thiserror::Error;
use ua_transport::{TransportError, TypeTag};

pub type Result<T, E = MachineError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("not connected to machine")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),
    #[error("livebit node not found, machine not supported (tried {})", .tried.join(", "))]
    DeviceNotSupported { tried: Vec<String> },
    #[error("{quantity} {value} out of range ({min} - {max})")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{class} pin number ({index}) out of range (1 - {max})")]
    PinOutOfRange {
        class: PinClass,
        index: u32,
        max: u32,
    },
    #[error("{class} pin {index} not found on this machine")]
    PinNotFound { class: PinClass, index: u32 },
    #[error("unknown variable type: {0}")]
    UnknownType(String),
    #[error("{parameter} holds {actual}, expected {expected}")]
    TypeMismatch {
        parameter: String,
        expected: TypeTag,
        actual: TypeTag,
    },
    #[error(transparent)]
    Protocol(#[from] TransportError),
}
