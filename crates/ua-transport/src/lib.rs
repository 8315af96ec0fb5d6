//! ua-transport: client seam for OPC UA controllers
//!
//! This crate provides the trait and types the machine layer talks to, with
//! feature-gated backends. The default build enables an in-process `mock`
//! backend so that binaries and tests run on any host without a controller;
//! the `opcua` feature adds a backend on top of the `opcua` client stack.

mod types;
pub use types::{
    Endpoint, EventSink, Notification, SubscriptionEvent, SubscriptionId, Timestamp, TypeTag,
    Value, DEFAULT_PORT,
};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{Connector, UaClient};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockClient, MockServer, WRITE_LOG_LIMIT};

#[cfg(feature = "opcua")]
mod ua;

#[cfg(feature = "opcua")]
pub use ua::{UaConnector, UaSessionClient};
