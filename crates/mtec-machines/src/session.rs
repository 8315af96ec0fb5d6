//! Dual-connection machine session and the livebit handshake.
//!
//! A session opens one client for reads and one for writes against the same
//! endpoint. Right after connecting it subscribes to the controller's
//! `Livebit2extern` heartbeat and echoes every value to the machine-side
//! livebit node, which the controller uses to decide whether a client is alive.

use crate::codec;
use crate::metrics::MetricsHub;
use crate::{MachineError, Result, SessionConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use ua_transport::{
    Connector, Endpoint, EventSink, Notification, SubscriptionEvent, SubscriptionId, TypeTag,
    UaClient, Value,
};

/// Scalar types that can be read from a controller variable.
pub trait FromValue: Sized {
    const TAG: TypeTag;
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for bool {
    const TAG: TypeTag = TypeTag::Bool;
    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for u16 {
    const TAG: TypeTag = TypeTag::UInt16;
    fn from_value(value: Value) -> Option<Self> {
        value.as_u16()
    }
}

impl FromValue for i32 {
    const TAG: TypeTag = TypeTag::Int32;
    fn from_value(value: Value) -> Option<Self> {
        value.as_i32()
    }
}

impl FromValue for f32 {
    const TAG: TypeTag = TypeTag::Float;
    fn from_value(value: Value) -> Option<Self> {
        value.as_f32()
    }
}

/// A channel-backed subscription created by [`MachineSession::subscribe`].
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: Receiver<Notification>,
}

struct Link<T> {
    endpoint: Endpoint,
    reader: Arc<T>,
    writer: Arc<T>,
    livebit_node: String,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

pub struct MachineSession<C: Connector> {
    connector: C,
    config: SessionConfig,
    metrics: Option<MetricsHub>,
    connected: Arc<AtomicBool>,
    link: Option<Link<C::Client>>,
}

impl<C: Connector> MachineSession<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        let metrics = match MetricsHub::new() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "session metrics disabled");
                None
            }
        };
        Self {
            connector,
            config,
            metrics,
            connected: Arc::new(AtomicBool::new(false)),
            link: None,
        }
    }

    pub fn with_defaults(connector: C) -> Self {
        Self::new(connector, SessionConfig::default())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }

    /// Full symbolic path of a relative parameter name.
    pub fn path(&self, parameter: &str) -> String {
        format!("{}{}", self.config.base_node, parameter)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some() && self.connected.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.link.as_ref().map(|l| &l.endpoint)
    }

    /// Relative name of the livebit node chosen during connect.
    pub fn livebit_node(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.livebit_node.as_str())
    }

    /// Open reader and writer, probe the livebit node and start the echo.
    ///
    /// Either every step succeeds and the session is connected, or nothing
    /// stays open. An existing connection is closed first.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.link.is_some() {
            info!(%endpoint, "reconnecting");
            self.disconnect()?;
        }
        let reader = self
            .connector
            .connect(endpoint)
            .map_err(MachineError::Connection)?;
        let writer = match self.connector.connect(endpoint) {
            Ok(w) => w,
            Err(e) => {
                let _ = reader.disconnect();
                return Err(MachineError::Connection(e));
            }
        };
        let reader = Arc::new(reader);
        let writer = Arc::new(writer);
        let abort = |e: MachineError| {
            let _ = reader.disconnect();
            let _ = writer.disconnect();
            e
        };

        reader
            .load_type_definitions()
            .and_then(|_| writer.load_type_definitions())
            .map_err(|e| abort(MachineError::Connection(e)))?;

        let livebit_node = self.probe_livebit(reader.as_ref()).map_err(&abort)?;

        let sink = livebit_sink(
            writer.clone(),
            self.path(&livebit_node),
            self.connected.clone(),
            self.metrics.clone(),
        );
        let extern_path = self.path(&self.config.livebit.extern_node);
        let livebit_sub = reader
            .subscribe(&extern_path, self.config.livebit.interval_ms, sink)
            .map_err(|e| abort(MachineError::Connection(e)))?;
        if let Some(m) = &self.metrics {
            m.session.subscriptions.inc();
        }

        info!(%endpoint, livebit = %livebit_node, "machine connected");
        self.link = Some(Link {
            endpoint: endpoint.clone(),
            reader,
            writer,
            livebit_node,
            subscriptions: Mutex::new(vec![livebit_sub]),
        });
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn probe_livebit(&self, reader: &C::Client) -> Result<String> {
        for candidate in &self.config.livebit.candidates {
            match reader.read(&self.path(candidate)) {
                Ok(_) => return Ok(candidate.clone()),
                Err(e) => debug!(node = %candidate, error = %e, "livebit candidate not readable"),
            }
        }
        Err(MachineError::DeviceNotSupported {
            tried: self.config.livebit.candidates.clone(),
        })
    }

    /// Tear down subscriptions and both connections. Calling it twice is harmless.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            return Ok(());
        };
        self.connected.store(false, Ordering::SeqCst);
        let subs = std::mem::take(
            &mut *link
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for id in subs {
            if let Err(e) = link.reader.unsubscribe(id) {
                debug!(subscription = %id, error = %e, "unsubscribe failed");
            }
        }
        if let Some(m) = &self.metrics {
            m.session.subscriptions.set(0);
        }
        let first_err = [link.reader.disconnect(), link.writer.disconnect()]
            .into_iter()
            .find_map(|r| r.err());
        info!(endpoint = %link.endpoint, "machine disconnected");
        match first_err {
            Some(e) => Err(MachineError::Connection(e)),
            None => Ok(()),
        }
    }

    fn link(&self) -> Result<&Link<C::Client>> {
        match &self.link {
            Some(link) if self.connected.load(Ordering::SeqCst) => Ok(link),
            _ => Err(MachineError::NotConnected),
        }
    }

    /// Read the raw value of a parameter.
    pub fn read(&self, parameter: &str) -> Result<Value> {
        let link = self.link()?;
        let path = self.path(parameter);
        let value = link.reader.read(&path)?;
        if let Some(m) = &self.metrics {
            m.session.reads.inc();
        }
        debug!(%parameter, %value, "read");
        Ok(value)
    }

    /// Read a parameter and require its wire type to be `T`.
    pub fn read_as<T: FromValue>(&self, parameter: &str) -> Result<T> {
        let value = self.read(parameter)?;
        T::from_value(value).ok_or_else(|| MachineError::TypeMismatch {
            parameter: parameter.to_string(),
            expected: T::TAG,
            actual: value.type_tag(),
        })
    }

    pub fn read_bool(&self, parameter: &str) -> Result<bool> {
        self.read_as(parameter)
    }

    pub fn read_u16(&self, parameter: &str) -> Result<u16> {
        self.read_as(parameter)
    }

    pub fn read_i32(&self, parameter: &str) -> Result<i32> {
        self.read_as(parameter)
    }

    pub fn read_f32(&self, parameter: &str) -> Result<f32> {
        self.read_as(parameter)
    }

    /// Read a variable the controller may not have. Yields `None` when the node
    /// is missing or carries another type; every other failure propagates.
    pub fn read_opt<T: FromValue>(&self, parameter: &str) -> Result<Option<T>> {
        match self.read_as(parameter) {
            Ok(v) => Ok(Some(v)),
            Err(MachineError::Protocol(e)) if e.is_node_not_found() => {
                debug!(%parameter, "optional variable absent");
                Ok(None)
            }
            Err(e @ MachineError::TypeMismatch { .. }) => {
                debug!(%parameter, error = %e, "optional variable ignored");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// [`read_opt`](Self::read_opt) with `default` for an absent variable.
    pub fn read_or<T: FromValue>(&self, parameter: &str, default: T) -> Result<T> {
        Ok(self.read_opt(parameter)?.unwrap_or(default))
    }

    /// Write a raw value.
    pub fn write(&self, parameter: &str, value: Value) -> Result<()> {
        let link = self.link()?;
        let path = self.path(parameter);
        link.writer.write(&path, value)?;
        if let Some(m) = &self.metrics {
            m.session.writes.inc();
        }
        debug!(%parameter, %value, "write");
        Ok(())
    }

    /// Coerce `value` to `ty` and write it.
    pub fn change(&self, parameter: &str, value: f64, ty: TypeTag) -> Result<()> {
        self.link()?;
        let raw = codec::coerce(value, ty)?;
        self.write(parameter, raw)
    }

    /// [`change`](Self::change) with the type given by name (`bool`, `uint16`,
    /// `int32`, `float`). Unknown names are an error.
    pub fn change_named(&self, parameter: &str, value: f64, ty: &str) -> Result<()> {
        self.link()?;
        let tag = ty.parse::<TypeTag>().map_err(MachineError::UnknownType)?;
        self.change(parameter, value, tag)
    }

    /// Call `listener` with every change of `parameter`. The listener runs on the
    /// client's delivery thread; `Notification::path` holds the relative name.
    pub fn subscribe_with<F>(
        &self,
        parameter: &str,
        interval_ms: u64,
        listener: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let link = self.link()?;
        let name = parameter.to_string();
        // the client may route its connection status to the newest sink only
        let connected = self.connected.clone();
        let sink: EventSink = Arc::new(move |event| match event {
            SubscriptionEvent::DataChange(mut n) => {
                n.path = name.clone();
                listener(n);
            }
            SubscriptionEvent::Status { good, code } => apply_status(&connected, good, &code),
        });
        let id = link
            .reader
            .subscribe(&self.path(parameter), interval_ms, sink)?;
        link.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        if let Some(m) = &self.metrics {
            m.session.subscriptions.inc();
        }
        debug!(%parameter, subscription = %id, interval_ms, "subscribed");
        Ok(id)
    }

    /// Channel flavour of [`subscribe_with`](Self::subscribe_with).
    pub fn subscribe(&self, parameter: &str, interval_ms: u64) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe_with(parameter, interval_ms, move |n| {
            let _ = tx.send(n);
        })?;
        Ok(Subscription { id, receiver: rx })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let link = self.link()?;
        link.reader.unsubscribe(id)?;
        link.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| *s != id);
        if let Some(m) = &self.metrics {
            m.session.subscriptions.dec();
        }
        Ok(())
    }
}

impl<C: Connector> Drop for MachineSession<C> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!(error = %e, "disconnect on drop failed");
        }
    }
}

fn livebit_sink<T: UaClient>(
    writer: Arc<T>,
    livebit_path: String,
    connected: Arc<AtomicBool>,
    metrics: Option<MetricsHub>,
) -> EventSink {
    Arc::new(move |event| match event {
        SubscriptionEvent::DataChange(n) => match n.value {
            Value::Bool(bit) => match writer.write(&livebit_path, Value::Bool(bit)) {
                Ok(()) => {
                    if let Some(m) = &metrics {
                        m.session.livebit_echoes.inc();
                    }
                }
                Err(e) => warn!(error = %e, "livebit echo failed"),
            },
            other => warn!(value = %other, "ignoring non-boolean livebit"),
        },
        SubscriptionEvent::Status { good, code } => apply_status(&connected, good, &code),
    })
}

fn apply_status(connected: &AtomicBool, good: bool, code: &str) {
    let was = connected.swap(good, Ordering::SeqCst);
    if was && !good {
        warn!(%code, "connection status lost");
    } else if !was && good {
        info!(%code, "connection status restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_BASE_NODE;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use ua_transport::{MockClient, MockServer, TransportError};

    fn p(name: &str) -> String {
        format!("{DEFAULT_BASE_NODE}{name}")
    }

    fn endpoint() -> Endpoint {
        Endpoint::parse("opc.tcp://127.0.0.1:4840").unwrap()
    }

    fn server() -> MockServer {
        MockServer::new()
            .with_node(p("Livebit2extern"), Value::Bool(false))
            .with_node(p("Livebit2machine"), Value::Bool(false))
            .with_node(p("x"), Value::Float(0.0))
            .with_node(p("count"), Value::Int32(3))
    }

    fn connected(server: &MockServer) -> MachineSession<MockServer> {
        let mut s = MachineSession::with_defaults(server.clone());
        s.connect(&endpoint()).unwrap();
        s
    }

    /// Failures the mock cannot produce on its own. Connection status goes
    /// only to the most recently registered sink, as with the `opcua` stack.
    #[derive(Clone, Default)]
    struct Faults {
        reads_fail: Arc<AtomicBool>,
        load_fails: bool,
        status_sink: Arc<Mutex<Option<EventSink>>>,
        disconnects: Arc<AtomicUsize>,
    }

    impl Faults {
        fn send_status(&self, good: bool, code: &str) {
            let sink = self.status_sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink(SubscriptionEvent::Status {
                    good,
                    code: code.to_string(),
                });
            }
        }
    }

    struct FaultyConnector {
        server: MockServer,
        faults: Faults,
    }

    struct FaultyClient {
        inner: MockClient,
        faults: Faults,
    }

    impl Connector for FaultyConnector {
        type Client = FaultyClient;

        fn connect(&self, endpoint: &Endpoint) -> ua_transport::Result<FaultyClient> {
            Ok(FaultyClient {
                inner: self.server.connect(endpoint)?,
                faults: self.faults.clone(),
            })
        }
    }

    impl UaClient for FaultyClient {
        fn load_type_definitions(&self) -> ua_transport::Result<()> {
            if self.faults.load_fails {
                return Err(TransportError::BadStatus {
                    path: "DataTypeDefinitions".into(),
                    code: "BadServiceUnsupported".into(),
                });
            }
            self.inner.load_type_definitions()
        }

        fn read(&self, path: &str) -> ua_transport::Result<Value> {
            if self.faults.reads_fail.load(Ordering::SeqCst) {
                return Err(TransportError::Io("socket reset".into()));
            }
            self.inner.read(path)
        }

        fn write(&self, path: &str, value: Value) -> ua_transport::Result<()> {
            self.inner.write(path, value)
        }

        fn subscribe(
            &self,
            path: &str,
            interval_ms: u64,
            sink: EventSink,
        ) -> ua_transport::Result<SubscriptionId> {
            let id = self.inner.subscribe(path, interval_ms, sink.clone())?;
            *self.faults.status_sink.lock().unwrap() = Some(sink);
            Ok(id)
        }

        fn unsubscribe(&self, id: SubscriptionId) -> ua_transport::Result<()> {
            self.inner.unsubscribe(id)
        }

        fn disconnect(&self) -> ua_transport::Result<()> {
            self.faults.disconnects.fetch_add(1, Ordering::SeqCst);
            self.inner.disconnect()
        }
    }

    fn faulty(srv: &MockServer, faults: &Faults) -> MachineSession<FaultyConnector> {
        MachineSession::with_defaults(FaultyConnector {
            server: srv.clone(),
            faults: faults.clone(),
        })
    }

    #[test]
    fn connect_opens_two_legs_and_uses_primary_livebit() {
        let srv = server();
        let s = connected(&srv);
        assert!(s.is_connected());
        assert_eq!(srv.connect_count(), 2);
        assert_eq!(s.livebit_node(), Some("Livebit2machine"));
        assert_eq!(srv.subscription_count(), 1);
    }

    #[test]
    fn connect_falls_back_to_duomix_livebit() {
        let srv = server();
        srv.remove_node(&p("Livebit2machine"));
        srv.set_node(p("Livebit2DuoMix"), Value::Bool(false));
        let s = connected(&srv);
        assert_eq!(s.livebit_node(), Some("Livebit2DuoMix"));
    }

    #[test]
    fn connect_without_livebit_is_not_supported() {
        let srv = server();
        srv.remove_node(&p("Livebit2machine"));
        let mut s = MachineSession::with_defaults(srv.clone());
        let err = s.connect(&endpoint()).unwrap_err();
        match err {
            MachineError::DeviceNotSupported { tried } => {
                assert_eq!(tried, vec!["Livebit2machine", "Livebit2DuoMix"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.is_connected());
        assert_eq!(srv.subscription_count(), 0);
        assert!(matches!(s.read("x"), Err(MachineError::NotConnected)));
    }

    #[test]
    fn failing_reader_leg_opens_nothing() {
        let srv = server();
        srv.refuse_connections_after(0);
        let faults = Faults::default();
        let mut s = faulty(&srv, &faults);
        assert!(matches!(
            s.connect(&endpoint()),
            Err(MachineError::Connection(TransportError::Connect { .. }))
        ));
        assert!(!s.is_connected());
        assert_eq!(srv.connect_count(), 0);
        assert_eq!(faults.disconnects.load(Ordering::SeqCst), 0);
        assert_eq!(srv.read_count(), 0);
    }

    #[test]
    fn failing_writer_leg_leaves_nothing_connected() {
        let srv = server();
        srv.refuse_connections_after(1);
        let faults = Faults::default();
        let mut s = faulty(&srv, &faults);
        assert!(matches!(
            s.connect(&endpoint()),
            Err(MachineError::Connection(_))
        ));
        assert!(!s.is_connected());
        assert_eq!(srv.connect_count(), 1);
        assert_eq!(faults.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(srv.subscription_count(), 0);
    }

    #[test]
    fn failing_type_definitions_close_both_legs() {
        let srv = server();
        let faults = Faults {
            load_fails: true,
            ..Faults::default()
        };
        let mut s = faulty(&srv, &faults);
        assert!(matches!(
            s.connect(&endpoint()),
            Err(MachineError::Connection(TransportError::BadStatus { .. }))
        ));
        assert!(!s.is_connected());
        assert_eq!(srv.connect_count(), 2);
        assert_eq!(faults.disconnects.load(Ordering::SeqCst), 2);
        assert_eq!(srv.read_count(), 0);
        assert_eq!(srv.subscription_count(), 0);
        assert!(matches!(s.read("x"), Err(MachineError::NotConnected)));
    }

    #[test]
    fn failing_livebit_subscription_closes_both_legs() {
        let srv = server();
        srv.remove_node(&p("Livebit2extern"));
        let faults = Faults::default();
        let mut s = faulty(&srv, &faults);
        assert!(matches!(
            s.connect(&endpoint()),
            Err(MachineError::Connection(TransportError::NodeNotFound(_)))
        ));
        assert!(!s.is_connected());
        assert_eq!(srv.connect_count(), 2);
        assert_eq!(srv.read_count(), 1);
        assert_eq!(faults.disconnects.load(Ordering::SeqCst), 2);
        assert_eq!(srv.subscription_count(), 0);
        assert!(s.livebit_node().is_none());
    }

    #[test]
    fn change_before_connect_is_rejected_without_io() {
        let srv = server();
        let s = MachineSession::with_defaults(srv.clone());
        assert!(matches!(
            s.change_named("x", 1.0, "float"),
            Err(MachineError::NotConnected)
        ));
        assert!(matches!(s.read("x"), Err(MachineError::NotConnected)));
        assert!(srv.writes().is_empty());
        assert_eq!(srv.read_count(), 0);
        assert_eq!(srv.connect_count(), 0);
    }

    #[test]
    fn livebit_notification_is_echoed_exactly_once() {
        let srv = server();
        let s = connected(&srv);
        srv.publish(&p("Livebit2extern"), Value::Bool(true));
        assert_eq!(
            srv.writes(),
            vec![(p("Livebit2machine"), Value::Bool(true))]
        );
        let echoes = s.metrics().unwrap().session.livebit_echoes.get();
        assert_eq!(echoes, 1);
    }

    #[test]
    fn non_boolean_livebit_is_ignored() {
        let srv = server();
        let _s = connected(&srv);
        srv.set_node(p("Livebit2extern"), Value::Int32(0));
        srv.publish(&p("Livebit2extern"), Value::Int32(1));
        assert!(srv.writes().is_empty());
    }

    #[test]
    fn disconnect_stops_the_echo() {
        let srv = server();
        let mut s = connected(&srv);
        s.disconnect().unwrap();
        s.disconnect().unwrap();
        srv.publish(&p("Livebit2extern"), Value::Bool(true));
        assert!(srv.writes().is_empty());
        assert!(!s.is_connected());
        assert_eq!(srv.subscription_count(), 0);
    }

    #[test]
    fn status_events_toggle_connected() {
        let srv = server();
        let s = connected(&srv);
        srv.publish_status(false, "BadConnectionClosed");
        assert!(!s.is_connected());
        assert!(matches!(
            s.change("x", 1.0, TypeTag::Float),
            Err(MachineError::NotConnected)
        ));
        srv.publish_status(true, "Good");
        assert!(s.is_connected());
    }

    #[test]
    fn status_reaches_session_through_user_subscription() {
        let srv = server();
        let faults = Faults::default();
        let mut s = faulty(&srv, &faults);
        s.connect(&endpoint()).unwrap();
        let sub = s.subscribe("x", 100).unwrap();

        faults.send_status(false, "BadConnectionClosed");
        assert!(!s.is_connected());
        assert!(matches!(s.read("x"), Err(MachineError::NotConnected)));
        assert!(sub.receiver.try_recv().is_err());

        faults.send_status(true, "Good");
        assert!(s.is_connected());
        srv.publish(&p("Livebit2extern"), Value::Bool(true));
        assert_eq!(
            srv.writes(),
            vec![(p("Livebit2machine"), Value::Bool(true))]
        );
    }

    #[test]
    fn change_coerces_and_writes() {
        let srv = server();
        let s = connected(&srv);
        s.change_named("x", 2.5, "float").unwrap();
        s.change("count", -7.9, TypeTag::Int32).unwrap();
        assert_eq!(
            srv.writes(),
            vec![(p("x"), Value::Float(2.5)), (p("count"), Value::Int32(-7))]
        );
    }

    #[test]
    fn unknown_type_name_fails_loudly() {
        let srv = server();
        let s = connected(&srv);
        match s.change_named("x", 1.0, "double") {
            Err(MachineError::UnknownType(t)) => assert_eq!(t, "double"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(srv.writes().is_empty());
    }

    #[test]
    fn protocol_errors_surface_verbatim() {
        let srv = server();
        let s = connected(&srv);
        assert!(matches!(
            s.read("missing"),
            Err(MachineError::Protocol(TransportError::NodeNotFound(_)))
        ));
        assert!(matches!(
            s.change("x", 1.0, TypeTag::Bool),
            Err(MachineError::Protocol(TransportError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn typed_reads_and_defaults() {
        let srv = server();
        let s = connected(&srv);
        assert_eq!(s.read_i32("count").unwrap(), 3);
        assert_eq!(s.read_f32("x").unwrap(), 0.0);
        match s.read_bool("count") {
            Err(MachineError::TypeMismatch {
                parameter,
                expected,
                actual,
            }) => {
                assert_eq!(parameter, "count");
                assert_eq!(expected, TypeTag::Bool);
                assert_eq!(actual, TypeTag::Int32);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.read_or("missing", 1.5_f32).unwrap(), 1.5);
        assert_eq!(s.read_or("count", 0_i32).unwrap(), 3);
        assert!(s.read_or("count", true).unwrap());
        assert_eq!(s.read_opt::<f32>("missing").unwrap(), None);
        assert_eq!(s.read_opt::<i32>("count").unwrap(), Some(3));

        let offline = MachineSession::with_defaults(srv.clone());
        assert!(matches!(
            offline.read_or("missing", 0.0_f32),
            Err(MachineError::NotConnected)
        ));
    }

    #[test]
    fn channel_subscription_delivers_relative_names() {
        let srv = server();
        let s = connected(&srv);
        let sub = s.subscribe("x", 100).unwrap();
        srv.publish(&p("x"), Value::Float(4.0));
        let n = sub.receiver.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(n.path, "x");
        assert_eq!(n.value, Value::Float(4.0));

        s.unsubscribe(sub.id).unwrap();
        srv.publish(&p("x"), Value::Float(5.0));
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn defaults_do_not_hide_transport_failures() {
        let srv = server();
        let faults = Faults::default();
        let mut s = faulty(&srv, &faults);
        s.connect(&endpoint()).unwrap();
        assert_eq!(s.read_or("missing", 2.0_f32).unwrap(), 2.0);

        faults.reads_fail.store(true, Ordering::SeqCst);
        match s.read_or("x", 2.0_f32) {
            Err(MachineError::Protocol(TransportError::Io(msg))) => {
                assert_eq!(msg, "socket reset")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            s.read_opt::<bool>("missing"),
            Err(MachineError::Protocol(TransportError::Io(_)))
        ));
    }
}
