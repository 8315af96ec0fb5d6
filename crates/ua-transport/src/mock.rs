use crate::{
    Connector, Endpoint, EventSink, Notification, Result, SubscriptionEvent, SubscriptionId,
    Timestamp, TransportError, UaClient, Value,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A simple in-process address space. Every client connected through the same
/// server sees the same nodes, which makes reader/writer splits testable.
///
/// Notifications are delivered synchronously on the thread that calls
/// [`MockServer::publish`].
/// Number of writes [`MockServer::writes`] remembers; older ones are dropped.
pub const WRITE_LOG_LIMIT: usize = 1024;

#[derive(Clone, Default)]
pub struct MockServer {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    nodes: HashMap<String, Value>,
    writes: VecDeque<(String, Value)>,
    reads: usize,
    connects: usize,
    connect_budget: Option<usize>,
    next_client: u32,
    next_subscription: u32,
    subscriptions: Vec<MockSubscription>,
}

struct MockSubscription {
    id: SubscriptionId,
    client: u32,
    path: String,
    sink: EventSink,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_node(self, path: impl Into<String>, value: Value) -> Self {
        self.set_node(path, value);
        self
    }

    /// Set a node without notifying subscribers.
    pub fn set_node(&self, path: impl Into<String>, value: Value) {
        self.lock().nodes.insert(path.into(), value);
    }

    pub fn remove_node(&self, path: &str) {
        self.lock().nodes.remove(path);
    }

    pub fn node(&self, path: &str) -> Option<Value> {
        self.lock().nodes.get(path).copied()
    }

    /// Set a node as the controller would and notify its subscribers.
    pub fn publish(&self, path: &str, value: Value) {
        let sinks: Vec<EventSink> = {
            let mut st = self.lock();
            st.nodes.insert(path.to_string(), value);
            st.subscriptions
                .iter()
                .filter(|s| s.path == path)
                .map(|s| s.sink.clone())
                .collect()
        };
        for sink in sinks {
            sink(SubscriptionEvent::DataChange(Notification {
                path: path.to_string(),
                value,
                timestamp: Some(Timestamp::now()),
            }));
        }
    }

    /// Report a connection status change to every subscription.
    pub fn publish_status(&self, good: bool, code: &str) {
        let sinks: Vec<EventSink> = self
            .lock()
            .subscriptions
            .iter()
            .map(|s| s.sink.clone())
            .collect();
        for sink in sinks {
            sink(SubscriptionEvent::Status {
                good,
                code: code.to_string(),
            });
        }
    }

    /// The last [`WRITE_LOG_LIMIT`] writes received, oldest first.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.lock().writes.iter().cloned().collect()
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Accept only `n` more connections; later attempts fail.
    pub fn refuse_connections_after(&self, n: usize) {
        self.lock().connect_budget = Some(n);
    }
}

impl Connector for MockServer {
    type Client = MockClient;

    fn connect(&self, endpoint: &Endpoint) -> Result<MockClient> {
        let mut st = self.lock();
        if let Some(budget) = st.connect_budget.as_mut() {
            if *budget == 0 {
                return Err(TransportError::Connect {
                    endpoint: endpoint.url(),
                    reason: "connection refused".into(),
                });
            }
            *budget -= 1;
        }
        st.connects += 1;
        st.next_client += 1;
        Ok(MockClient {
            server: self.clone(),
            id: st.next_client,
            open: AtomicBool::new(true),
        })
    }
}

/// One client session bound to a [`MockServer`].
pub struct MockClient {
    server: MockServer,
    id: u32,
    open: AtomicBool,
}

impl MockClient {
    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl UaClient for MockClient {
    fn read(&self, path: &str) -> Result<Value> {
        self.ensure_open()?;
        let mut st = self.server.lock();
        st.reads += 1;
        st.nodes
            .get(path)
            .copied()
            .ok_or_else(|| TransportError::NodeNotFound(path.to_string()))
    }

    fn write(&self, path: &str, value: Value) -> Result<()> {
        self.ensure_open()?;
        let mut st = self.server.lock();
        let current = st
            .nodes
            .get(path)
            .copied()
            .ok_or_else(|| TransportError::NodeNotFound(path.to_string()))?;
        if current.type_tag() != value.type_tag() {
            return Err(TransportError::TypeMismatch {
                path: path.to_string(),
                node: current.type_tag(),
                written: value.type_tag(),
            });
        }
        st.nodes.insert(path.to_string(), value);
        if st.writes.len() == WRITE_LOG_LIMIT {
            st.writes.pop_front();
        }
        st.writes.push_back((path.to_string(), value));
        Ok(())
    }

    fn subscribe(&self, path: &str, _interval_ms: u64, sink: EventSink) -> Result<SubscriptionId> {
        self.ensure_open()?;
        let mut st = self.server.lock();
        if !st.nodes.contains_key(path) {
            return Err(TransportError::NodeNotFound(path.to_string()));
        }
        st.next_subscription += 1;
        let id = SubscriptionId(st.next_subscription);
        st.subscriptions.push(MockSubscription {
            id,
            client: self.id,
            path: path.to_string(),
            sink,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.ensure_open()?;
        let mut st = self.server.lock();
        let before = st.subscriptions.len();
        st.subscriptions.retain(|s| s.id != id);
        if st.subscriptions.len() == before {
            return Err(TransportError::Io(format!("unknown subscription {id}")));
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            let id = self.id;
            self.server.lock().subscriptions.retain(|s| s.client != id);
        }
        Ok(())
    }
}
