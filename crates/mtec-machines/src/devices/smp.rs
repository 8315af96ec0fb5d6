//! SMP: a duo-mix 3DCP+ mixing pump with silo, rotary valve, compressor and
//! vibrators. The extra variables only exist on some builds and read with defaults.

use super::{Device, Mixingpump, MixingpumpModel, MixingpumpStatus};
use crate::{MachineSession, Result, Signal};
use serde::Serialize;
use ua_transport::Connector;

const ROTARY_VALVE: &str = "aut_cw";
const COMPRESSOR: &str = "aut_comp";
const VIBRATORS: [&str; 2] = ["aut_vib_1", "aut_vib_2"];
const SILO_LEVEL: &str = "Silo_Level";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmpStatus {
    pub rotary_valve: bool,
    pub compressor: bool,
    pub vibrators: (bool, bool),
    pub silo_level_percent: f32,
    pub mixingpump: MixingpumpStatus,
}

pub struct Smp<C: Connector> {
    pump: Mixingpump<C>,
}

impl<C: Connector> Smp<C> {
    pub fn new(session: MachineSession<C>) -> Self {
        Self {
            pump: Mixingpump::new(session, MixingpumpModel::DuoMixPlus),
        }
    }

    /// The mixing pump part of the plant.
    pub fn pump(&self) -> &Mixingpump<C> {
        &self.pump
    }

    pub fn rotary_valve(&self) -> Result<bool> {
        self.session().read_or(ROTARY_VALVE, false)
    }

    pub fn compressor(&self) -> Result<bool> {
        self.session().read_or(COMPRESSOR, false)
    }

    pub fn vibrators(&self) -> Result<(bool, bool)> {
        let s = self.session();
        Ok((s.read_or(VIBRATORS[0], false)?, s.read_or(VIBRATORS[1], false)?))
    }

    /// Silo fill level in %.
    pub fn silo_level(&self) -> Result<f32> {
        self.session().read_or(SILO_LEVEL, 0.0)
    }

    pub fn status(&self) -> Result<SmpStatus> {
        Ok(SmpStatus {
            rotary_valve: self.rotary_valve()?,
            compressor: self.compressor()?,
            vibrators: self.vibrators()?,
            silo_level_percent: self.silo_level()?,
            mixingpump: self.pump.status()?,
        })
    }
}

impl<C: Connector> Device for Smp<C> {
    type Connector = C;

    fn session(&self) -> &MachineSession<C> {
        self.pump.session()
    }

    fn session_mut(&mut self) -> &mut MachineSession<C> {
        self.pump.session_mut()
    }

    fn signals(&self) -> &'static [Signal] {
        self.pump.signals()
    }
}
