use crate::{Endpoint, EventSink, Result, SubscriptionId, TransportError, Value};

/// Opens client sessions against a controller.
pub trait Connector {
    type Client: UaClient;

    /// Open one client session to `endpoint`.
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Client>;
}

/// A minimal blocking OPC UA client session.
///
/// Paths are full symbolic node ids (`ns=4;s=...`). Implementations serialize
/// their own wire traffic, so every method takes `&self`.
pub trait UaClient: Send + Sync + 'static {
    /// Load server-side type metadata needed for later writes.
    fn load_type_definitions(&self) -> Result<()> {
        Ok(())
    }

    /// Read the current value of one variable.
    fn read(&self, path: &str) -> Result<Value>;

    /// Write one variable with the given wire type.
    fn write(&self, path: &str, value: Value) -> Result<()>;

    /// Register for data changes of `path`, sampled every `interval_ms`.
    fn subscribe(&self, path: &str, interval_ms: u64, sink: EventSink) -> Result<SubscriptionId>;

    /// Remove a subscription if supported.
    fn unsubscribe(&self, _id: SubscriptionId) -> Result<()> {
        Err(TransportError::Unsupported("unsubscribe not supported"))
    }

    /// Close the session.
    fn disconnect(&self) -> Result<()>;
}
