use serde::{Deserialize, Serialize};

/// Program namespace of the m-tec controllers.
pub const DEFAULT_BASE_NODE: &str = "ns=4;s=|var|B-Fortis CC-Slim S04.Application.GVL_OPC.";

/// Heartbeat toggled by the controller.
pub const LIVEBIT_EXTERN: &str = "Livebit2extern";

/// Echo targets, probed in order. Duo-mix controllers use the second name.
pub const LIVEBIT_CANDIDATES: [&str; 2] = ["Livebit2machine", "Livebit2DuoMix"];

pub const LIVEBIT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineKind {
    DuoMix,
    DuoMixPlus,
    DuoMixLegacy,
    Smp,
    Printhead,
    Dosingpump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivebitConfig {
    #[serde(default = "default_extern_node")]
    pub extern_node: String,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for LivebitConfig {
    fn default() -> Self {
        Self {
            extern_node: default_extern_node(),
            candidates: default_candidates(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// What a [`crate::MachineSession`] needs besides the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_base_node")]
    pub base_node: String,
    #[serde(default)]
    pub livebit: LivebitConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_node: default_base_node(),
            livebit: LivebitConfig::default(),
        }
    }
}

/// One machine descriptor as stored in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    pub kind: MachineKind,
    /// Bare host (`10.129.4.73`) or full `opc.tcp://` URL.
    pub endpoint: String,
    #[serde(flatten)]
    pub session: SessionConfig,
}

/// A boolean status variable. Active-low signals read `true` on the wire when
/// the condition is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub name: &'static str,
    pub node: &'static str,
    pub active_low: bool,
}

impl Signal {
    pub const fn high(name: &'static str, node: &'static str) -> Self {
        Self {
            name,
            node,
            active_low: false,
        }
    }

    pub const fn low(name: &'static str, node: &'static str) -> Self {
        Self {
            name,
            node,
            active_low: true,
        }
    }

    pub fn logical(&self, raw: bool) -> bool {
        raw != self.active_low
    }
}

fn default_base_node() -> String {
    DEFAULT_BASE_NODE.to_string()
}

fn default_extern_node() -> String {
    LIVEBIT_EXTERN.to_string()
}

fn default_candidates() -> Vec<String> {
    LIVEBIT_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_interval_ms() -> u64 {
    LIVEBIT_INTERVAL_MS
}
