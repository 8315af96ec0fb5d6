//! Conversions between engineering units and the raw encodings the controller expects.

use crate::{MachineError, Result};
use serde::{Deserialize, Serialize};
use ua_transport::{TypeTag, Value};

const RAW_MAX: f64 = u16::MAX as f64;

/// Affine map between an engineering range and the full uint16 span.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    pub quantity: &'static str,
    pub min: f64,
    pub max: f64,
}

/// Mixing pump set point, current generation: 20 Hz = 0, 50 Hz = 65535.
pub const MIXINGPUMP_HZ: LinearScale = LinearScale::new("speed in Hz", 20.0, 50.0);

/// Mixing pump set point, earlier generation: 0 % = 0, 100 % = 65535.
pub const MIXINGPUMP_PERCENT: LinearScale = LinearScale::new("speed in %", 0.0, 100.0);

/// Mixing pump speed feedback: 0 Hz = 0, 50 Hz = 65535.
pub const MIXINGPUMP_ACTUAL_HZ: LinearScale = LinearScale::new("actual speed in Hz", 0.0, 50.0);

impl LinearScale {
    pub const fn new(quantity: &'static str, min: f64, max: f64) -> Self {
        Self { quantity, min, max }
    }

    /// Engineering value to raw. Values outside `[min, max]` are rejected, never clamped.
    pub fn encode(&self, value: f64) -> Result<u16> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(MachineError::OutOfRange {
                quantity: self.quantity,
                value,
                min: self.min,
                max: self.max,
            });
        }
        let raw = ((value - self.min) * RAW_MAX / (self.max - self.min)).round();
        Ok(raw.clamp(0.0, RAW_MAX) as u16)
    }

    pub fn decode(&self, raw: u16) -> f64 {
        f64::from(raw) * (self.max - self.min) / RAW_MAX + self.min
    }

    /// Engineering width of one raw unit.
    pub fn step(&self) -> f64 {
        (self.max - self.min) / RAW_MAX
    }
}

/// How a mixing pump generation encodes its speed set point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedConvention {
    Hertz,
    Percent,
}

impl SpeedConvention {
    pub fn scale(self) -> LinearScale {
        match self {
            SpeedConvention::Hertz => MIXINGPUMP_HZ,
            SpeedConvention::Percent => MIXINGPUMP_PERCENT,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SpeedConvention::Hertz => "Hz",
            SpeedConvention::Percent => "%",
        }
    }
}

/// Old percent-based speed entry point expressed in Hz (0 % = 20 Hz, 100 % = 50 Hz).
pub fn percent_to_hz(percent: f64) -> Result<f64> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(MachineError::OutOfRange {
            quantity: "speed in %",
            value: percent,
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(percent * 30.0 / 100.0 + 20.0)
}

/// Coerce a caller-supplied number into the wire type named by `tag`.
pub fn coerce(value: f64, tag: TypeTag) -> Result<Value> {
    if !value.is_finite() {
        return Err(MachineError::OutOfRange {
            quantity: tag.as_str(),
            value,
            min: f64::MIN,
            max: f64::MAX,
        });
    }
    match tag {
        TypeTag::Bool => Ok(Value::Bool(value != 0.0)),
        TypeTag::UInt16 => {
            let v = value.abs().trunc();
            if v > RAW_MAX {
                return Err(MachineError::OutOfRange {
                    quantity: "uint16",
                    value,
                    min: 0.0,
                    max: RAW_MAX,
                });
            }
            Ok(Value::UInt16(v as u16))
        }
        TypeTag::Int32 => {
            let v = value.trunc();
            if v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
                return Err(MachineError::OutOfRange {
                    quantity: "int32",
                    value,
                    min: f64::from(i32::MIN),
                    max: f64::from(i32::MAX),
                });
            }
            Ok(Value::Int32(v as i32))
        }
        TypeTag::Float => Ok(Value::Float(value as f32)),
    }
}
