//! In-process controller used by `--mock`.

use mtec_machines::ua_transport::{MockServer, Value};
use std::thread;
use std::time::Duration;
use tracing::debug;

const NODES: &[(&str, Value)] = &[
    ("Livebit2extern", Value::Bool(false)),
    ("Livebit2machine", Value::Bool(false)),
    // mixing pump
    ("Remote_start", Value::Bool(false)),
    ("set_value_mixingpump", Value::UInt16(32768)),
    ("actual_value_mixingpump", Value::UInt16(0)),
    ("state_dosingpump_on", Value::Bool(false)),
    ("set_value_dosingpump", Value::Float(0.0)),
    ("set_value_water_flow", Value::Float(240.0)),
    ("actual_value_water_flow", Value::Float(0.0)),
    ("actual_value_water_temp", Value::Float(14.5)),
    ("actual_value_mat_temp", Value::Float(19.0)),
    ("actual_value_pressure", Value::Float(0.0)),
    ("error", Value::Bool(false)),
    ("error_no", Value::Int32(0)),
    ("Ready_for_operation", Value::Bool(true)),
    ("aut_mixer", Value::Bool(false)),
    ("aut_mixingpump_net", Value::Bool(false)),
    ("aut_mixingpump_fc", Value::Bool(false)),
    ("aut_solenoid_valve", Value::Bool(false)),
    ("aut_waterpump", Value::Bool(false)),
    ("Remote_connected", Value::Bool(true)),
    ("FC_ok", Value::Bool(false)),
    ("Motor_protection_ok", Value::Bool(false)),
    // smp
    ("aut_cw", Value::Bool(false)),
    ("aut_comp", Value::Bool(false)),
    ("aut_vib_1", Value::Bool(false)),
    ("aut_vib_2", Value::Bool(false)),
    ("Silo_Level", Value::Float(73.0)),
    // print head
    ("state_printhead_on", Value::Bool(false)),
    ("set_value_printhead", Value::Float(0.0)),
    ("actual_value_printhead", Value::Int32(0)),
    ("actual_value_pressure_printhead", Value::Float(0.0)),
    ("state_solenoid_valve", Value::Bool(false)),
    ("error_printhead", Value::Bool(false)),
    ("error_no_printhead", Value::Int32(0)),
    ("Ready_for_operation_printhead", Value::Bool(true)),
    // dosing pump
    ("actual_value_additive", Value::Int32(0)),
    ("actual_value_pressure_dosingpump", Value::Float(0.0)),
    ("error_dosingpump", Value::Bool(false)),
    ("error_no_dosingpump", Value::Int32(0)),
    ("Ready_for_operation_dosingpump", Value::Bool(true)),
];

/// A controller with every known variable under `base_node`, toggling its
/// livebit every `tick` and following the pump set point on the feedback node.
pub fn server(base_node: &str, tick: Duration) -> anyhow::Result<MockServer> {
    let srv = MockServer::new();
    for (name, value) in NODES {
        srv.set_node(format!("{base_node}{name}"), *value);
    }
    for i in 1..=8 {
        srv.set_node(format!("{base_node}reserve_DO_{i}"), Value::Bool(false));
    }
    for i in 1..=10 {
        srv.set_node(format!("{base_node}reserve_DI_{i}"), Value::Bool(false));
    }
    for i in 1..=2 {
        srv.set_node(format!("{base_node}reserve_AO_{i}"), Value::UInt16(0));
    }
    for i in 1..=5 {
        srv.set_node(format!("{base_node}reserve_AI_{i}"), Value::UInt16(0));
    }

    let plc = srv.clone();
    let livebit = format!("{base_node}Livebit2extern");
    let running = format!("{base_node}Remote_start");
    let set_point = format!("{base_node}set_value_mixingpump");
    let actual = format!("{base_node}actual_value_mixingpump");
    thread::Builder::new()
        .name("mock-plc".into())
        .spawn(move || {
            let mut bit = false;
            loop {
                thread::sleep(tick);
                bit = !bit;
                plc.publish(&livebit, Value::Bool(bit));
                let on = matches!(plc.node(&running), Some(Value::Bool(true)));
                let target = match (on, plc.node(&set_point)) {
                    // set point spans 20..50 Hz, feedback 0..50 Hz
                    (true, Some(Value::UInt16(raw))) => {
                        let hz = f64::from(raw) * 30.0 / 65535.0 + 20.0;
                        (hz * 65535.0 / 50.0).round() as u16
                    }
                    _ => 0,
                };
                debug!(bit, target, "mock plc tick");
                plc.publish(&actual, Value::UInt16(target));
            }
        })?;
    Ok(srv)
}
