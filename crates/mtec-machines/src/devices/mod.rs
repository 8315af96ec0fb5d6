//! Device facades. Each one owns a [`MachineSession`] and a table of its own
//! parameter names; none of them build on another device's accessors.

use crate::pins::{PinClass, PinPolicy};
use crate::{MachineError, MachineSession, Result, Signal};
use ua_transport::{Connector, Endpoint};

mod dosingpump;
mod mixingpump;
mod printhead;
mod smp;

pub use dosingpump::{Dosingpump, DosingpumpStatus, DOSINGPUMP_SIGNALS};
pub use mixingpump::{Mixingpump, MixingpumpModel, MixingpumpStatus, MIXINGPUMP_SIGNALS};
pub use printhead::{Printhead, PrintheadStatus, PRINTHEAD_SIGNALS};
pub use smp::{Smp, SmpStatus};

/// Behaviour shared by every facade.
pub trait Device {
    type Connector: Connector;

    fn session(&self) -> &MachineSession<Self::Connector>;

    fn session_mut(&mut self) -> &mut MachineSession<Self::Connector>;

    /// Boolean status signals this device exposes.
    fn signals(&self) -> &'static [Signal];

    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.session_mut().connect(endpoint)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.session_mut().disconnect()
    }

    fn is_connected(&self) -> bool {
        self.session().is_connected()
    }

    /// Read a signal with its polarity applied.
    fn signal(&self, signal: &Signal) -> Result<bool> {
        let raw = self.session().read_as::<bool>(signal.node)?;
        Ok(signal.logical(raw))
    }

    /// Look up a signal of this device by accessor name and read it.
    fn signal_by_name(&self, name: &str) -> Result<Option<bool>> {
        match self.signals().iter().find(|s| s.name == name) {
            Some(s) => self.signal(s).map(Some),
            None => Ok(None),
        }
    }
}

/// Run `io` against the node of pin `index`, validating the index first.
pub(crate) fn with_pin<C, T>(
    session: &MachineSession<C>,
    policy: PinPolicy,
    class: PinClass,
    index: u32,
    io: impl FnOnce(&MachineSession<C>, &str) -> Result<T>,
) -> Result<T>
where
    C: Connector,
{
    let node = policy.node(class, index)?;
    match io(session, &node) {
        Err(MachineError::Protocol(e)) if policy == PinPolicy::Discover && e.is_node_not_found() => {
            Err(MachineError::PinNotFound { class, index })
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use crate::{MachineSession, DEFAULT_BASE_NODE};
    use ua_transport::{Endpoint, MockServer, Value};

    pub fn p(name: &str) -> String {
        format!("{DEFAULT_BASE_NODE}{name}")
    }

    /// A mock controller with a livebit pair plus the given variables.
    pub fn server(nodes: &[(&str, Value)]) -> MockServer {
        let srv = MockServer::new()
            .with_node(p("Livebit2extern"), Value::Bool(false))
            .with_node(p("Livebit2machine"), Value::Bool(false));
        for (name, value) in nodes {
            srv.set_node(p(name), *value);
        }
        srv
    }

    pub fn session(srv: &MockServer) -> MachineSession<MockServer> {
        let mut s = MachineSession::with_defaults(srv.clone());
        s.connect(&Endpoint::parse("10.129.4.73").unwrap()).unwrap();
        s
    }
}
