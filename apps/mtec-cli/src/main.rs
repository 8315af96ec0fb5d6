use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use mtec_machines as mtec;
use mtec_machines::ua_transport::{Connector, Endpoint, Notification, Value};
use mtec_machines::{MachineKind, MachineSession, MixingpumpModel, SessionConfig};

mod demo;

#[derive(Parser, Debug)]
#[command(
    name = "mtec",
    version,
    about = "m-tec machine CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Talk to an in-process mock controller instead of a real one
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Target {
    /// Controller host (10.129.4.73, host:port) or opc.tcp:// URL
    #[arg(long, default_value = "127.0.0.1")]
    endpoint: String,
    /// Machine descriptor YAML; supplies endpoint, kind and node settings
    #[arg(long)]
    config: Option<String>,
    /// Variable prefix, overrides the descriptor
    #[arg(long)]
    base_node: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    DuoMix,
    DuoMixPlus,
    DuoMixLegacy,
    Smp,
    Printhead,
    Dosingpump,
}

impl Kind {
    fn into_machine(self) -> MachineKind {
        match self {
            Kind::DuoMix => MachineKind::DuoMix,
            Kind::DuoMixPlus => MachineKind::DuoMixPlus,
            Kind::DuoMixLegacy => MachineKind::DuoMixLegacy,
            Kind::Smp => MachineKind::Smp,
            Kind::Printhead => MachineKind::Printhead,
            Kind::Dosingpump => MachineKind::Dosingpump,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect, run the livebit probe and disconnect
    Probe {
        #[command(flatten)]
        target: Target,
        /// Print the result as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Read one variable
    Read {
        #[command(flatten)]
        target: Target,
        /// Variable name relative to the base node (e.g., Ready_for_operation)
        parameter: String,
    },
    /// Write one variable, coercing the value to the given type
    Write {
        #[command(flatten)]
        target: Target,
        parameter: String,
        /// Number, or true/false
        #[arg(value_parser = parse_number, allow_hyphen_values = true)]
        value: f64,
        /// bool, uint16, int32 or float
        #[arg(long = "type", default_value = "float")]
        ty: String,
    },
    /// Subscribe to a variable and print changes as JSON lines
    Watch {
        #[command(flatten)]
        target: Target,
        parameter: String,
        /// Sampling interval in milliseconds
        #[arg(long, default_value_t = 500u64)]
        interval_ms: u64,
        /// Stop after this many notifications (0 = unlimited)
        #[arg(long, default_value_t = 10u32)]
        count: u32,
        /// Stop when nothing arrives for this long
        #[arg(long, default_value_t = 5000u64)]
        timeout_ms: u64,
    },
    /// Print the status snapshot of a machine as JSON
    Status {
        #[command(flatten)]
        target: Target,
        /// Machine kind (defaults to the descriptor's kind)
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },
    /// Read or change the mixing pump speed
    MixingpumpSpeed {
        #[command(flatten)]
        target: Target,
        /// Machine kind (defaults to the descriptor's kind, else duo-mix)
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// New set point in the model's unit (Hz, or % on legacy pumps)
        #[arg(long)]
        set: Option<f64>,
        /// New set point in % of the speed range
        #[arg(long, conflicts_with = "set")]
        percent: Option<f64>,
    },
    /// Validate machine descriptors
    ConfigValidate {
        /// Single descriptor file
        #[arg(long)]
        file: Option<String>,
        /// Directory of descriptors
        #[arg(long)]
        dir: Option<String>,
        /// Print the parsed descriptors as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Connect, keep the session up for a while and print session metrics
    Metrics {
        #[command(flatten)]
        target: Target,
        /// How long to keep the livebit running before printing
        #[arg(long, default_value_t = 2000u64)]
        hold_ms: u64,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    if let Commands::ConfigValidate { file, dir, json } = &cli.command {
        return config_validate(file.as_deref(), dir.as_deref(), *json);
    }
    if cli.mock {
        let base = base_node_of(&cli.command)?;
        let srv = demo::server(&base, Duration::from_millis(500))?;
        run(srv, cli.command)
    } else {
        run_live(cli.command)
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(feature = "opcua")]
fn run_live(command: Commands) -> Result<()> {
    run(mtec::ua_transport::UaConnector::default(), command)
}

#[cfg(not(feature = "opcua"))]
fn run_live(_command: Commands) -> Result<()> {
    bail!("built without the opcua feature; pass --mock or rebuild with --features opcua")
}

fn run<C: Connector>(connector: C, command: Commands) -> Result<()> {
    match command {
        Commands::Probe { target, json } => probe(connector, &target, json),
        Commands::Read { target, parameter } => read(connector, &target, &parameter),
        Commands::Write {
            target,
            parameter,
            value,
            ty,
        } => write(connector, &target, &parameter, value, &ty),
        Commands::Watch {
            target,
            parameter,
            interval_ms,
            count,
            timeout_ms,
        } => watch(connector, &target, &parameter, interval_ms, count, timeout_ms),
        Commands::Status { target, kind } => status(connector, &target, kind),
        Commands::MixingpumpSpeed {
            target,
            kind,
            set,
            percent,
        } => mixingpump_speed(connector, &target, kind, set, percent),
        Commands::Metrics { target, hold_ms } => metrics(connector, &target, hold_ms),
        Commands::ConfigValidate { file, dir, json } => {
            config_validate(file.as_deref(), dir.as_deref(), json)
        }
    }
}

struct Resolved {
    endpoint: Endpoint,
    session: SessionConfig,
    kind: Option<MachineKind>,
}

impl Target {
    fn resolve(&self) -> Result<Resolved> {
        let mut resolved = match &self.config {
            Some(path) => {
                let cfg = mtec::load_config_file(path)?;
                Resolved {
                    endpoint: cfg.endpoint()?,
                    session: cfg.session,
                    kind: Some(cfg.kind),
                }
            }
            None => Resolved {
                endpoint: Endpoint::parse(&self.endpoint)
                    .with_context(|| format!("invalid endpoint: {}", self.endpoint))?,
                session: SessionConfig::default(),
                kind: None,
            },
        };
        if let Some(base) = &self.base_node {
            resolved.session.base_node = base.clone();
        }
        Ok(resolved)
    }
}

fn target_of(command: &Commands) -> Option<&Target> {
    match command {
        Commands::Probe { target, .. }
        | Commands::Read { target, .. }
        | Commands::Write { target, .. }
        | Commands::Watch { target, .. }
        | Commands::Status { target, .. }
        | Commands::MixingpumpSpeed { target, .. }
        | Commands::Metrics { target, .. } => Some(target),
        Commands::ConfigValidate { .. } => None,
    }
}

fn base_node_of(command: &Commands) -> Result<String> {
    match target_of(command) {
        Some(t) => Ok(t.resolve()?.session.base_node),
        None => Ok(SessionConfig::default().base_node),
    }
}

fn open<C: Connector>(
    connector: C,
    target: &Target,
) -> Result<(MachineSession<C>, Option<MachineKind>)> {
    let r = target.resolve()?;
    let mut session = MachineSession::new(connector, r.session);
    session
        .connect(&r.endpoint)
        .with_context(|| format!("connecting to {}", r.endpoint))?;
    Ok((session, r.kind))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_number(s: &str) -> Result<f64, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "on" => Ok(1.0),
        "false" | "off" => Ok(0.0),
        other => other
            .parse::<f64>()
            .map_err(|e| format!("invalid number {s}: {e}")),
    }
}

fn value_json(value: Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => serde_json::Value::from(b),
        Value::UInt16(v) => serde_json::Value::from(v),
        Value::Int32(v) => serde_json::Value::from(v),
        Value::Float(v) => serde_json::Value::from(f64::from(v)),
    }
}

#[derive(Serialize)]
struct ProbeReport {
    endpoint: String,
    livebit: Option<String>,
    connected: bool,
}

fn probe<C: Connector>(connector: C, target: &Target, json: bool) -> Result<()> {
    let (mut session, _) = open(connector, target)?;
    let report = ProbeReport {
        endpoint: session
            .endpoint()
            .map(|e| e.url())
            .unwrap_or_default(),
        livebit: session.livebit_node().map(str::to_string),
        connected: session.is_connected(),
    };
    session.disconnect()?;
    if json {
        print_json(&report)?;
    } else {
        println!(
            "ok: {} (livebit={})",
            report.endpoint,
            report.livebit.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn read<C: Connector>(connector: C, target: &Target, parameter: &str) -> Result<()> {
    let (session, _) = open(connector, target)?;
    let value = session.read(parameter)?;
    println!("{parameter}\t{}\t{value}", value.type_tag());
    Ok(())
}

fn write<C: Connector>(
    connector: C,
    target: &Target,
    parameter: &str,
    value: f64,
    ty: &str,
) -> Result<()> {
    let (session, _) = open(connector, target)?;
    session.change_named(parameter, value, ty)?;
    let now = session.read(parameter)?;
    println!("ok: {parameter} = {now}");
    Ok(())
}

#[derive(Serialize)]
struct WatchRecord {
    parameter: String,
    #[serde(rename = "type")]
    ty: String,
    value: serde_json::Value,
    timestamp: Option<String>,
}

impl From<Notification> for WatchRecord {
    fn from(n: Notification) -> Self {
        WatchRecord {
            ty: n.value.type_tag().to_string(),
            value: value_json(n.value),
            timestamp: n.timestamp.and_then(|t| t.0.format(&Rfc3339).ok()),
            parameter: n.path,
        }
    }
}

fn watch<C: Connector>(
    connector: C,
    target: &Target,
    parameter: &str,
    interval_ms: u64,
    count: u32,
    timeout_ms: u64,
) -> Result<()> {
    let (session, _) = open(connector, target)?;
    let sub = session.subscribe(parameter, interval_ms)?;
    info!(%parameter, interval_ms, "watching");
    let mut seen = 0u32;
    while count == 0 || seen < count {
        match sub.receiver.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(n) => {
                println!("{}", serde_json::to_string(&WatchRecord::from(n))?);
                seen += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                eprintln!("no change of {parameter} within {timeout_ms} ms");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    session.unsubscribe(sub.id)?;
    Ok(())
}

fn kind_for(arg: Option<Kind>, configured: Option<MachineKind>) -> Option<MachineKind> {
    arg.map(Kind::into_machine).or(configured)
}

fn status<C: Connector>(connector: C, target: &Target, kind: Option<Kind>) -> Result<()> {
    let (session, configured) = open(connector, target)?;
    let kind = kind_for(kind, configured)
        .ok_or_else(|| anyhow!("provide --kind or a descriptor with --config"))?;
    match kind {
        MachineKind::Smp => print_json(&mtec::Smp::new(session).status()?),
        MachineKind::Printhead => print_json(&mtec::Printhead::new(session).status()?),
        MachineKind::Dosingpump => print_json(&mtec::Dosingpump::new(session).status()?),
        MachineKind::DuoMix | MachineKind::DuoMixPlus | MachineKind::DuoMixLegacy => {
            let model = kind
                .mixingpump_model()
                .ok_or_else(|| anyhow!("{kind:?} has no mixing pump"))?;
            print_json(&mtec::Mixingpump::new(session, model).status()?)
        }
    }
}

fn mixingpump_speed<C: Connector>(
    connector: C,
    target: &Target,
    kind: Option<Kind>,
    set: Option<f64>,
    percent: Option<f64>,
) -> Result<()> {
    let (session, configured) = open(connector, target)?;
    let kind = kind_for(kind, configured).unwrap_or(MachineKind::DuoMix);
    let model: MixingpumpModel = kind
        .mixingpump_model()
        .ok_or_else(|| anyhow!("{kind:?} has no mixing pump"))?;
    let pump = mtec::Mixingpump::new(session, model);
    if let Some(v) = set {
        pump.set_speed(v)?;
    }
    if let Some(p) = percent {
        pump.set_speed_percent(p)?;
    }
    println!(
        "set point: {:.2} {}\tactual: {:.2} Hz",
        pump.speed()?,
        pump.speed_unit(),
        pump.real_speed()?
    );
    Ok(())
}

fn metrics<C: Connector>(connector: C, target: &Target, hold_ms: u64) -> Result<()> {
    let (session, _) = open(connector, target)?;
    thread::sleep(Duration::from_millis(hold_ms));
    if !session.is_connected() {
        bail!("connection lost while holding the session");
    }
    match session.metrics() {
        Some(m) => print!("{}", m.encode_text()),
        None => bail!("metrics unavailable"),
    }
    Ok(())
}

fn config_validate(file: Option<&str>, dir: Option<&str>, json: bool) -> Result<()> {
    match (file, dir) {
        (Some(f), None) => {
            let cfg = mtec::load_config_file(f)?;
            println!("ok: {} (kind={:?}, endpoint={})", cfg.name, cfg.kind, cfg.endpoint()?);
            if json {
                print_json(&cfg)?;
            }
        }
        (None, Some(d)) => {
            let reg = mtec::load_configs_dir(d)?;
            println!("ok: loaded {} machines", reg.machines.len());
            if json {
                print_json(&reg.machines)?;
            }
        }
        _ => {
            return Err(anyhow!("provide --file <path> or --dir <dir>"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target {
            endpoint: "127.0.0.1".into(),
            config: None,
            base_node: None,
        }
    }

    #[test]
    fn cli_parses_commands() {
        let cli = Cli::try_parse_from([
            "mtec", "--mock", "write", "set_value_water_flow", "250", "--type", "float",
        ])
        .unwrap();
        assert!(cli.mock);
        assert!(matches!(cli.command, Commands::Write { value, .. } if value == 250.0));

        let cli = Cli::try_parse_from(["mtec", "status", "--kind", "duo-mix-plus"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Status {
                kind: Some(Kind::DuoMixPlus),
                ..
            }
        ));
    }

    #[test]
    fn boolean_words_parse_as_numbers() {
        assert_eq!(parse_number("true").unwrap(), 1.0);
        assert_eq!(parse_number("OFF").unwrap(), 0.0);
        assert_eq!(parse_number("-3.5").unwrap(), -3.5);
        assert!(parse_number("fast").is_err());
    }

    #[test]
    fn mock_round_trip_through_commands() {
        let srv = demo::server(mtec::DEFAULT_BASE_NODE, Duration::from_secs(3600)).unwrap();
        write(srv.clone(), &target(), "set_value_water_flow", 300.0, "float").unwrap();
        assert_eq!(
            srv.node(&format!("{}set_value_water_flow", mtec::DEFAULT_BASE_NODE)),
            Some(Value::Float(300.0))
        );
        mixingpump_speed(srv.clone(), &target(), None, Some(50.0), None).unwrap();
        assert_eq!(
            srv.node(&format!("{}set_value_mixingpump", mtec::DEFAULT_BASE_NODE)),
            Some(Value::UInt16(65535))
        );
        status(srv.clone(), &target(), Some(Kind::Smp)).unwrap();
        assert!(status(srv, &target(), None).is_err());
    }

    #[test]
    fn watch_record_formats_rfc3339() {
        let ts = time::OffsetDateTime::from_unix_timestamp(0).unwrap();
        let rec = WatchRecord::from(Notification {
            path: "Silo_Level".into(),
            value: Value::Float(42.0),
            timestamp: Some(mtec::ua_transport::Timestamp(ts)),
        });
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert_eq!(json["type"], "float");
        assert_eq!(json["value"], 42.0);
    }
}
