//! Mixing pump facade (duo-mix 3DCP, duo-mix 3DCP+ and the percent-based generation).

use super::{with_pin, Device};
use crate::codec::{self, SpeedConvention, MIXINGPUMP_ACTUAL_HZ};
use crate::pins::{PinClass, PinPolicy};
use crate::session::FromValue;
use crate::{MachineKind, MachineSession, Result, Signal};
use serde::{Deserialize, Serialize};
use tracing::info;
use ua_transport::{Connector, Value};

const REMOTE_START: &str = "Remote_start";
const SET_SPEED: &str = "set_value_mixingpump";
const ACTUAL_SPEED: &str = "actual_value_mixingpump";
const DOSINGPUMP_ON: &str = "state_dosingpump_on";
const DOSINGPUMP_SPEED: &str = "set_value_dosingpump";
const WATER_SET: &str = "set_value_water_flow";
const WATER_ACTUAL: &str = "actual_value_water_flow";
const WATER_TEMP: &str = "actual_value_water_temp";
const MATERIAL_TEMP: &str = "actual_value_mat_temp";
const PRESSURE: &str = "actual_value_pressure";
const ERROR_NO: &str = "error_no";

const ERROR: Signal = Signal::high("error", "error");
const READY: Signal = Signal::high("ready", "Ready_for_operation");
const MIXING: Signal = Signal::high("mixing", "aut_mixer");
const PUMPING_NET: Signal = Signal::high("pumping_net", "aut_mixingpump_net");
const PUMPING_FC: Signal = Signal::high("pumping_fc", "aut_mixingpump_fc");
const SOLENOID_VALVE: Signal = Signal::high("solenoid_valve", "aut_solenoid_valve");
const WATERPUMP: Signal = Signal::high("waterpump", "aut_waterpump");
const REMOTE: Signal = Signal::high("remote", "Remote_connected");
const FC_OK: Signal = Signal::low("frequency_converter_ok", "FC_ok");
const MOTOR_PROTECTION_OK: Signal = Signal::low("motor_protection_ok", "Motor_protection_ok");

pub const MIXINGPUMP_SIGNALS: &[Signal] = &[
    ERROR,
    READY,
    MIXING,
    PUMPING_NET,
    PUMPING_FC,
    SOLENOID_VALVE,
    WATERPUMP,
    REMOTE,
    FC_OK,
    MOTOR_PROTECTION_OK,
];

/// Controller generation. Decides the speed encoding, the pin policy and
/// whether the dosing and water variables may be absent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixingpumpModel {
    DuoMix3dcp,
    DuoMixPlus,
    Legacy,
}

impl MixingpumpModel {
    pub fn convention(self) -> SpeedConvention {
        match self {
            MixingpumpModel::DuoMix3dcp | MixingpumpModel::DuoMixPlus => SpeedConvention::Hertz,
            MixingpumpModel::Legacy => SpeedConvention::Percent,
        }
    }

    pub fn pins(self) -> PinPolicy {
        match self {
            MixingpumpModel::DuoMixPlus => PinPolicy::Discover,
            MixingpumpModel::DuoMix3dcp | MixingpumpModel::Legacy => PinPolicy::Bounded,
        }
    }

    fn optional_extras(self) -> bool {
        self == MixingpumpModel::DuoMixPlus
    }
}

impl MachineKind {
    /// Mixing pump generation behind this kind, if it has one. SMP plants
    /// carry a duo-mix 3DCP+ pump.
    pub fn mixingpump_model(self) -> Option<MixingpumpModel> {
        match self {
            MachineKind::DuoMix => Some(MixingpumpModel::DuoMix3dcp),
            MachineKind::DuoMixPlus | MachineKind::Smp => Some(MixingpumpModel::DuoMixPlus),
            MachineKind::DuoMixLegacy => Some(MixingpumpModel::Legacy),
            MachineKind::Printhead | MachineKind::Dosingpump => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixingpumpStatus {
    pub model: MixingpumpModel,
    pub running: bool,
    pub speed: f64,
    pub speed_unit: &'static str,
    pub real_speed_hz: f64,
    pub dosingpump: bool,
    pub dosing_speed_percent: f32,
    pub water_l_h: f32,
    pub real_water_l_h: f32,
    pub real_water_temperature_c: f32,
    pub real_temperature_c: f32,
    pub real_pressure_bar: f32,
    pub error: bool,
    pub error_no: i32,
    pub ready: bool,
    pub mixing: bool,
    pub pumping: bool,
    pub solenoid_valve: bool,
    pub waterpump: bool,
    pub remote: bool,
    /// `None` when a duo-mix 3DCP+ controller does not publish the signal.
    pub frequency_converter_ok: Option<bool>,
    pub motor_protection_ok: Option<bool>,
}

pub struct Mixingpump<C: Connector> {
    session: MachineSession<C>,
    model: MixingpumpModel,
}

impl<C: Connector> Mixingpump<C> {
    pub fn new(session: MachineSession<C>, model: MixingpumpModel) -> Self {
        Self { session, model }
    }

    pub fn model(&self) -> MixingpumpModel {
        self.model
    }

    fn extra<T: FromValue>(&self, parameter: &str, default: T) -> Result<T> {
        if self.model.optional_extras() {
            self.session.read_or(parameter, default)
        } else {
            self.session.read_as(parameter)
        }
    }

    fn extra_signal(&self, signal: &Signal) -> Result<Option<bool>> {
        if self.model.optional_extras() {
            let raw = self.session.read_opt::<bool>(signal.node)?;
            Ok(raw.map(|r| signal.logical(r)))
        } else {
            self.signal(signal).map(Some)
        }
    }

    pub fn running(&self) -> Result<bool> {
        self.session.read_bool(REMOTE_START)
    }

    pub fn set_running(&self, on: bool) -> Result<()> {
        info!(on, "mixing pump remote start");
        self.session.write(REMOTE_START, Value::Bool(on))
    }

    pub fn start(&self) -> Result<()> {
        self.set_running(true)
    }

    pub fn stop(&self) -> Result<()> {
        self.set_running(false)
    }

    /// Unit of [`speed`](Self::speed) and [`set_speed`](Self::set_speed).
    pub fn speed_unit(&self) -> &'static str {
        self.model.convention().unit()
    }

    /// Speed set point in the model's unit.
    pub fn speed(&self) -> Result<f64> {
        let raw = self.session.read_u16(SET_SPEED)?;
        Ok(self.model.convention().scale().decode(raw))
    }

    /// Set the speed in the model's unit (Hz: 20 - 50, %: 0 - 100). The value
    /// is validated before anything is written.
    pub fn set_speed(&self, value: f64) -> Result<()> {
        let raw = self.model.convention().scale().encode(value)?;
        self.session.write(SET_SPEED, Value::UInt16(raw))
    }

    /// Percent entry point (0 % = 20 Hz, 100 % = 50 Hz on Hz models).
    pub fn set_speed_percent(&self, percent: f64) -> Result<()> {
        match self.model.convention() {
            SpeedConvention::Hertz => self.set_speed(codec::percent_to_hz(percent)?),
            SpeedConvention::Percent => self.set_speed(percent),
        }
    }

    /// Measured pump speed in Hz.
    pub fn real_speed(&self) -> Result<f64> {
        let raw = self.session.read_u16(ACTUAL_SPEED)?;
        Ok(MIXINGPUMP_ACTUAL_HZ.decode(raw))
    }

    pub fn dosingpump(&self) -> Result<bool> {
        self.extra(DOSINGPUMP_ON, false)
    }

    pub fn set_dosingpump(&self, on: bool) -> Result<()> {
        self.session.write(DOSINGPUMP_ON, Value::Bool(on))
    }

    /// Dosing pump speed in %.
    pub fn dosing_speed(&self) -> Result<f32> {
        self.extra(DOSINGPUMP_SPEED, 0.0)
    }

    pub fn set_dosing_speed(&self, percent: f32) -> Result<()> {
        self.session.write(DOSINGPUMP_SPEED, Value::Float(percent))
    }

    /// Water set point in l/h.
    pub fn water(&self) -> Result<f32> {
        self.extra(WATER_SET, 0.0)
    }

    pub fn set_water(&self, l_per_h: f32) -> Result<()> {
        self.session.write(WATER_SET, Value::Float(l_per_h))
    }

    pub fn real_water(&self) -> Result<f32> {
        self.extra(WATER_ACTUAL, 0.0)
    }

    /// Water temperature in °C.
    pub fn real_water_temperature(&self) -> Result<f32> {
        self.extra(WATER_TEMP, 0.0)
    }

    /// Mortar temperature in °C.
    pub fn real_temperature(&self) -> Result<f32> {
        self.extra(MATERIAL_TEMP, 0.0)
    }

    /// Mortar pressure in bar.
    pub fn real_pressure(&self) -> Result<f32> {
        self.extra(PRESSURE, 0.0)
    }

    pub fn error(&self) -> Result<bool> {
        self.signal(&ERROR)
    }

    /// Controller error number, 0 when there is none.
    pub fn error_no(&self) -> Result<i32> {
        self.session.read_i32(ERROR_NO)
    }

    /// On, remote, mixer and pump all enabled.
    pub fn ready(&self) -> Result<bool> {
        self.signal(&READY)
    }

    pub fn mixing(&self) -> Result<bool> {
        self.signal(&MIXING)
    }

    /// Running on either mains or frequency converter supply.
    pub fn pumping(&self) -> Result<bool> {
        Ok(self.pumping_net()? || self.pumping_fc()?)
    }

    pub fn pumping_net(&self) -> Result<bool> {
        self.signal(&PUMPING_NET)
    }

    pub fn pumping_fc(&self) -> Result<bool> {
        self.signal(&PUMPING_FC)
    }

    pub fn solenoid_valve(&self) -> Result<bool> {
        self.signal(&SOLENOID_VALVE)
    }

    pub fn waterpump(&self) -> Result<bool> {
        self.signal(&WATERPUMP)
    }

    pub fn remote(&self) -> Result<bool> {
        self.signal(&REMOTE)
    }

    pub fn frequency_converter_ok(&self) -> Result<bool> {
        self.signal(&FC_OK)
    }

    pub fn motor_protection_ok(&self) -> Result<bool> {
        self.signal(&MOTOR_PROTECTION_OK)
    }

    pub fn set_digital(&self, pin: u32, on: bool) -> Result<()> {
        with_pin(
            &self.session,
            self.model.pins(),
            PinClass::DigitalOut,
            pin,
            |s, node| s.write(node, Value::Bool(on)),
        )
    }

    pub fn digital(&self, pin: u32) -> Result<bool> {
        with_pin(
            &self.session,
            self.model.pins(),
            PinClass::DigitalIn,
            pin,
            |s, node| s.read_bool(node),
        )
    }

    /// Raw analog output, 0 - 65535.
    pub fn set_analog(&self, pin: u32, raw: u16) -> Result<()> {
        with_pin(
            &self.session,
            self.model.pins(),
            PinClass::AnalogOut,
            pin,
            |s, node| s.write(node, Value::UInt16(raw)),
        )
    }

    pub fn analog(&self, pin: u32) -> Result<u16> {
        with_pin(
            &self.session,
            self.model.pins(),
            PinClass::AnalogIn,
            pin,
            |s, node| s.read_u16(node),
        )
    }

    pub fn status(&self) -> Result<MixingpumpStatus> {
        Ok(MixingpumpStatus {
            model: self.model,
            running: self.running()?,
            speed: self.speed()?,
            speed_unit: self.speed_unit(),
            real_speed_hz: self.real_speed()?,
            dosingpump: self.dosingpump()?,
            dosing_speed_percent: self.dosing_speed()?,
            water_l_h: self.water()?,
            real_water_l_h: self.real_water()?,
            real_water_temperature_c: self.real_water_temperature()?,
            real_temperature_c: self.real_temperature()?,
            real_pressure_bar: self.real_pressure()?,
            error: self.error()?,
            error_no: self.error_no()?,
            ready: self.ready()?,
            mixing: self.mixing()?,
            pumping: self.pumping()?,
            solenoid_valve: self.solenoid_valve()?,
            waterpump: self.waterpump()?,
            remote: self.remote()?,
            frequency_converter_ok: self.extra_signal(&FC_OK)?,
            motor_protection_ok: self.extra_signal(&MOTOR_PROTECTION_OK)?,
        })
    }
}

impl<C: Connector> Device for Mixingpump<C> {
    type Connector = C;

    fn session(&self) -> &MachineSession<C> {
        &self.session
    }

    fn session_mut(&mut self) -> &mut MachineSession<C> {
        &mut self.session
    }

    fn signals(&self) -> &'static [Signal] {
        MIXINGPUMP_SIGNALS
    }
}
