//! General-purpose I/O pins exposed as `reserve_<class>_<n>` variables.

use crate::{MachineError, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use ua_transport::TypeTag;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinClass {
    DigitalOut,
    DigitalIn,
    AnalogOut,
    AnalogIn,
}

impl PinClass {
    fn prefix(self) -> &'static str {
        match self {
            PinClass::DigitalOut => "reserve_DO_",
            PinClass::DigitalIn => "reserve_DI_",
            PinClass::AnalogOut => "reserve_AO_",
            PinClass::AnalogIn => "reserve_AI_",
        }
    }

    /// Highest valid index on the base machine generation.
    pub fn fixed_bound(self) -> u32 {
        match self {
            PinClass::DigitalOut => 8,
            PinClass::DigitalIn => 10,
            PinClass::AnalogOut => 2,
            PinClass::AnalogIn => 5,
        }
    }

    pub fn type_tag(self) -> TypeTag {
        match self {
            PinClass::DigitalOut | PinClass::DigitalIn => TypeTag::Bool,
            PinClass::AnalogOut | PinClass::AnalogIn => TypeTag::UInt16,
        }
    }
}

impl fmt::Display for PinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PinClass::DigitalOut => "digital output",
            PinClass::DigitalIn => "digital input",
            PinClass::AnalogOut => "analog output",
            PinClass::AnalogIn => "analog input",
        })
    }
}

/// How a machine generation validates pin indices.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinPolicy {
    /// Fixed per-class bounds, checked before any I/O.
    #[default]
    Bounded,
    /// No fixed bound; a missing node is reported as [`MachineError::PinNotFound`].
    Discover,
}

impl PinPolicy {
    /// Validate `index` and return the relative parameter name.
    pub fn node(self, class: PinClass, index: u32) -> Result<String> {
        let max = match self {
            PinPolicy::Bounded => class.fixed_bound(),
            PinPolicy::Discover => u32::MAX,
        };
        if index < 1 || index > max {
            return match self {
                PinPolicy::Bounded => Err(MachineError::PinOutOfRange { class, index, max }),
                PinPolicy::Discover => Err(MachineError::PinNotFound { class, index }),
            };
        }
        Ok(format!("{}{index}", class.prefix()))
    }
}
