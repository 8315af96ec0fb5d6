use crate::{
    Connector, Endpoint, EventSink, Notification, Result, SubscriptionEvent, SubscriptionId,
    Timestamp, TransportError, UaClient, Value,
};
use opcua::client::prelude::*;
use opcua::sync::RwLock;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Opens anonymous, unsecured sessions through the `opcua` client stack.
#[derive(Clone, Debug)]
pub struct UaConnector {
    pub application_name: String,
    pub application_uri: String,
    pub trust_server_certs: bool,
}

impl Default for UaConnector {
    fn default() -> Self {
        Self {
            application_name: "mtec-connect".to_string(),
            application_uri: "urn:mtec-connect".to_string(),
            trust_server_certs: true,
        }
    }
}

impl Connector for UaConnector {
    type Client = UaSessionClient;

    fn connect(&self, endpoint: &Endpoint) -> Result<UaSessionClient> {
        let url = endpoint.url();
        let mut client = ClientBuilder::new()
            .application_name(self.application_name.as_str())
            .application_uri(self.application_uri.as_str())
            .trust_server_certs(self.trust_server_certs)
            .create_sample_keypair(true)
            .session_retry_limit(0)
            .client()
            .ok_or_else(|| TransportError::Connect {
                endpoint: url.clone(),
                reason: "invalid client configuration".into(),
            })?;
        let description: EndpointDescription = (
            url.as_str(),
            SecurityPolicy::None.to_str(),
            MessageSecurityMode::None,
            UserTokenPolicy::anonymous(),
        )
            .into();
        let session = client
            .connect_to_endpoint(description, IdentityToken::Anonymous)
            .map_err(|code| TransportError::Connect {
                endpoint: url.clone(),
                reason: code.to_string(),
            })?;
        let stop = Session::run_async(session.clone());
        debug!(%url, "opc ua session established");
        Ok(UaSessionClient {
            _client: client,
            session,
            stop: Mutex::new(Some(stop)),
        })
    }
}

/// A live session; the stack's own thread delivers subscription callbacks.
pub struct UaSessionClient {
    _client: Client,
    session: Arc<RwLock<Session>>,
    stop: Mutex<Option<tokio::sync::oneshot::Sender<SessionCommand>>>,
}

fn node_id(path: &str) -> Result<NodeId> {
    NodeId::from_str(path).map_err(|_| TransportError::NodeNotFound(path.to_string()))
}

fn status_error(path: &str, code: StatusCode) -> TransportError {
    if code == StatusCode::BadNodeIdUnknown || code == StatusCode::BadNodeIdInvalid {
        TransportError::NodeNotFound(path.to_string())
    } else {
        TransportError::BadStatus {
            path: path.to_string(),
            code: code.to_string(),
        }
    }
}

fn from_variant(path: &str, v: &Variant) -> Result<Value> {
    match *v {
        Variant::Boolean(b) => Ok(Value::Bool(b)),
        Variant::UInt16(x) => Ok(Value::UInt16(x)),
        Variant::Int32(x) => Ok(Value::Int32(x)),
        Variant::Float(x) => Ok(Value::Float(x)),
        _ => Err(TransportError::BadStatus {
            path: path.to_string(),
            code: format!("unsupported variant {v:?}"),
        }),
    }
}

fn to_variant(value: Value) -> Variant {
    match value {
        Value::Bool(b) => Variant::Boolean(b),
        Value::UInt16(x) => Variant::UInt16(x),
        Value::Int32(x) => Variant::Int32(x),
        Value::Float(x) => Variant::Float(x),
    }
}

impl UaClient for UaSessionClient {
    fn read(&self, path: &str) -> Result<Value> {
        let node = node_id(path)?;
        let session = self.session.read();
        let values = session
            .read(&[ReadValueId::from(node)], TimestampsToReturn::Neither, 0.0)
            .map_err(|code| status_error(path, code))?;
        let dv = values
            .first()
            .ok_or_else(|| TransportError::Io(format!("empty read response for {path}")))?;
        if let Some(status) = dv.status {
            if !status.is_good() {
                return Err(status_error(path, status));
            }
        }
        let variant = dv
            .value
            .as_ref()
            .ok_or_else(|| TransportError::NodeNotFound(path.to_string()))?;
        from_variant(path, variant)
    }

    fn write(&self, path: &str, value: Value) -> Result<()> {
        let node = node_id(path)?;
        let request = WriteValue {
            node_id: node,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::value_only(to_variant(value)),
        };
        let session = self.session.read();
        let results = session
            .write(&[request])
            .map_err(|code| status_error(path, code))?;
        match results.first() {
            Some(code) if code.is_good() => Ok(()),
            Some(code) => Err(status_error(path, *code)),
            None => Err(TransportError::Io(format!("empty write response for {path}"))),
        }
    }

    fn subscribe(&self, path: &str, interval_ms: u64, sink: EventSink) -> Result<SubscriptionId> {
        let node = node_id(path)?;
        let owned_path = path.to_string();
        let data_sink = sink.clone();
        let callback = DataChangeCallback::new(move |items: &[&MonitoredItem]| {
            for item in items {
                let Some(variant) = item.last_value().value.as_ref() else {
                    continue;
                };
                match from_variant(&owned_path, variant) {
                    Ok(value) => data_sink(SubscriptionEvent::DataChange(Notification {
                        path: owned_path.clone(),
                        value,
                        timestamp: Some(Timestamp::now()),
                    })),
                    Err(e) => warn!(error = %e, "dropping notification"),
                }
            }
        });
        // The stack keeps one status callback per session; the latest subscriber receives it.
        self.session
            .write()
            .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
                sink(SubscriptionEvent::Status {
                    good: connected,
                    code: if connected { "Good" } else { "BadConnectionClosed" }.to_string(),
                })
            }));
        let session = self.session.read();
        let sub_id = session
            .create_subscription(interval_ms as f64, 10, 30, 0, 0, true, callback)
            .map_err(|code| status_error(path, code))?;
        let created = session
            .create_monitored_items(
                sub_id,
                TimestampsToReturn::Both,
                &[MonitoredItemCreateRequest::from(node)],
            )
            .map_err(|code| status_error(path, code))?;
        if let Some(res) = created.first() {
            if !res.status_code.is_good() {
                let _ = session.delete_subscription(sub_id);
                return Err(status_error(path, res.status_code));
            }
        }
        Ok(SubscriptionId(sub_id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let session = self.session.read();
        session
            .delete_subscription(id.0)
            .map(|_| ())
            .map_err(|code| TransportError::BadStatus {
                path: id.to_string(),
                code: code.to_string(),
            })
    }

    fn disconnect(&self) -> Result<()> {
        let stop = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = stop {
            let _ = tx.send(SessionCommand::Stop);
            self.session.read().disconnect();
        }
        Ok(())
    }
}
