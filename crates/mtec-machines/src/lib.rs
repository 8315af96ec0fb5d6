//! mtec-machines: typed facades for m-tec 3D concrete printing machines
//!
//! A [`MachineSession`] owns a reader and a writer connection to the machine's
//! OPC UA server and keeps the controller's livebit handshake alive. Device
//! facades in [`devices`] map accessor names onto controller variables and
//! convert between engineering units and raw encodings.

mod types;
pub use types::*;

mod error;
pub use error::{MachineError, Result};

pub mod codec;
pub use codec::{LinearScale, SpeedConvention};

mod pins;
pub use pins::{PinClass, PinPolicy};

mod config;
pub use config::{load_config_file, load_configs_dir, MachineRegistry};

mod metrics;
pub use metrics::{MetricsHub, SessionMetrics};

mod session;
pub use session::{FromValue, MachineSession, Subscription};

pub mod devices;
pub use devices::{Device, Dosingpump, Mixingpump, MixingpumpModel, Printhead, Smp};

pub use ua_transport;
