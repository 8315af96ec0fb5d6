use super::Device;
use crate::{MachineSession, Result, Signal};
use serde::Serialize;
use tracing::info;
use ua_transport::{Connector, Value};

const RUNNING: &str = "state_dosingpump_on";
const SET_SPEED: &str = "set_value_dosingpump";
const ACTUAL_SPEED: &str = "actual_value_additive";
const PRESSURE: &str = "actual_value_pressure_dosingpump";
const CLEANING: &str = "state_solenoid_valve";
const ERROR_NO: &str = "error_no_dosingpump";

const ERROR: Signal = Signal::high("error", "error_dosingpump");
const READY: Signal = Signal::high("ready", "Ready_for_operation_dosingpump");

pub const DOSINGPUMP_SIGNALS: &[Signal] = &[ERROR, READY];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DosingpumpStatus {
    pub running: bool,
    pub speed_ml_min: f32,
    pub real_speed_ml_min: i32,
    pub real_pressure_bar: f32,
    pub cleaning: bool,
    pub error: bool,
    pub error_no: i32,
    pub ready: bool,
}

/// Stand-alone additive dosing pump.
pub struct Dosingpump<C: Connector> {
    session: MachineSession<C>,
}

impl<C: Connector> Dosingpump<C> {
    pub fn new(session: MachineSession<C>) -> Self {
        Self { session }
    }

    pub fn running(&self) -> Result<bool> {
        self.session.read_bool(RUNNING)
    }

    pub fn set_running(&self, on: bool) -> Result<()> {
        info!(on, "dosing pump");
        self.session.write(RUNNING, Value::Bool(on))
    }

    pub fn start(&self) -> Result<()> {
        self.set_running(true)
    }

    pub fn stop(&self) -> Result<()> {
        self.set_running(false)
    }

    /// Flow set point in ml/min.
    pub fn speed(&self) -> Result<f32> {
        self.session.read_f32(SET_SPEED)
    }

    pub fn set_speed(&self, ml_per_min: f32) -> Result<()> {
        self.session.write(SET_SPEED, Value::Float(ml_per_min))
    }

    pub fn real_speed(&self) -> Result<i32> {
        self.session.read_i32(ACTUAL_SPEED)
    }

    pub fn real_pressure(&self) -> Result<f32> {
        self.session.read_f32(PRESSURE)
    }

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

    pub fn status(&self) -> Result<DosingpumpStatus> {
        Ok(DosingpumpStatus {
            running: self.running()?,
            speed_ml_min: self.speed()?,
            real_speed_ml_min: self.real_speed()?,
            real_pressure_bar: self.real_pressure()?,
            cleaning: self.cleaning()?,
            error: self.error()?,
            error_no: self.error_no()?,
            ready: self.ready()?,
        })
    }
}

impl<C: Connector> Device for Dosingpump<C> {
    type Connector = C;

    fn session(&self) -> &MachineSession<C> {
        &self.session
    }

    fn session_mut(&mut self) -> &mut MachineSession<C> {
        &mut self.session
    }

    fn signals(&self) -> &'static [Signal] {
        DOSINGPUMP_SIGNALS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testkit::{p, server, session};

    #[test]
    fn dosing_cycle() {
        let srv = server(&[
            (RUNNING, Value::Bool(false)),
            (SET_SPEED, Value::Float(0.0)),
            (ACTUAL_SPEED, Value::Int32(0)),
            (PRESSURE, Value::Float(1.25)),
            (CLEANING, Value::Bool(false)),
            ("error_dosingpump", Value::Bool(true)),
            (ERROR_NO, Value::Int32(17)),
            ("Ready_for_operation_dosingpump", Value::Bool(false)),
        ]);
        let dp = Dosingpump::new(session(&srv));
        dp.set_speed(450.0).unwrap();
        dp.start().unwrap();
        srv.set_node(p(ACTUAL_SPEED), Value::Int32(447));

        let st = dp.status().unwrap();
        assert!(st.running);
        assert_eq!(st.speed_ml_min, 450.0);
        assert_eq!(st.real_speed_ml_min, 447);
        assert!(st.error);
        assert_eq!(st.error_no, 17);
        assert!(!st.ready);

        dp.stop().unwrap();
        assert_eq!(srv.node(&p(RUNNING)), Some(Value::Bool(false)));
    }
}
