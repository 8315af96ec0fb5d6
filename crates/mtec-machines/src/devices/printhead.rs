use super::Device;
use crate::{MachineSession, Result, Signal};
use serde::Serialize;
use tracing::info;
use ua_transport::{Connector, Value};

const RUNNING: &str = "state_printhead_on";
const SET_SPEED: &str = "set_value_printhead";
const ACTUAL_SPEED: &str = "actual_value_printhead";
const PRESSURE: &str = "actual_value_pressure_printhead";
const CLEANING: &str = "state_solenoid_valve";
const ERROR_NO: &str = "error_no_printhead";

const ERROR: Signal = Signal::high("error", "error_printhead");
const READY: Signal = Signal::high("ready", "Ready_for_operation_printhead");

pub const PRINTHEAD_SIGNALS: &[Signal] = &[ERROR, READY];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintheadStatus {
    pub running: bool,
    pub speed_rpm: f32,
    pub real_speed_rpm: i32,
    pub real_pressure_bar: f32,
    pub cleaning: bool,
    pub error: bool,
    pub error_no: i32,
    pub ready: bool,
}

/// Print head with its own screw drive and cleaning-water valve.
pub struct Printhead<C: Connector> {
    session: MachineSession<C>,
}

impl<C: Connector> Printhead<C> {
    pub fn new(session: MachineSession<C>) -> Self {
        Self { session }
    }

    pub fn running(&self) -> Result<bool> {
        self.session.read_bool(RUNNING)
    }

    pub fn set_running(&self, on: bool) -> Result<()> {
        info!(on, "print head");
        self.session.write(RUNNING, Value::Bool(on))
    }

    pub fn start(&self) -> Result<()> {
        self.set_running(true)
    }

    pub fn stop(&self) -> Result<()> {
        self.set_running(false)
    }

    /// Speed set point in 1/min.
    pub fn speed(&self) -> Result<f32> {
        self.session.read_f32(SET_SPEED)
    }

    pub fn set_speed(&self, rpm: f32) -> Result<()> {
        self.session.write(SET_SPEED, Value::Float(rpm))
    }

    /// Measured speed in 1/min.
    pub fn real_speed(&self) -> Result<i32> {
        self.session.read_i32(ACTUAL_SPEED)
    }

    /// Pressure in bar.
    pub fn real_pressure(&self) -> Result<f32> {
        self.session.read_f32(PRESSURE)
    }

    /// Cleaning water valve.
    pub fn cleaning(&self) -> Result<bool> {
        self.session.read_bool(CLEANING)
    }

    pub fn set_cleaning(&self, open: bool) -> Result<()> {
        self.session.write(CLEANING, Value::Bool(open))
    }

    pub fn error(&self) -> Result<bool> {
        self.signal(&ERROR)
    }

    pub fn error_no(&self) -> Result<i32> {
        self.session.read_i32(ERROR_NO)
    }

    pub fn ready(&self) -> Result<bool> {
        self.signal(&READY)
    }

    pub fn status(&self) -> Result<PrintheadStatus> {
        Ok(PrintheadStatus {
            running: self.running()?,
            speed_rpm: self.speed()?,
            real_speed_rpm: self.real_speed()?,
            real_pressure_bar: self.real_pressure()?,
            cleaning: self.cleaning()?,
            error: self.error()?,
            error_no: self.error_no()?,
            ready: self.ready()?,
        })
    }
}

impl<C: Connector> Device for Printhead<C> {
    type Connector = C;

    fn session(&self) -> &MachineSession<C> {
        &self.session
    }

    fn session_mut(&mut self) -> &mut MachineSession<C> {
        &mut self.session
    }

    fn signals(&self) -> &'static [Signal] {
        PRINTHEAD_SIGNALS
    }
}
