use crate::types::MachineConfig;
use anyhow::{bail, Context};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use ua_transport::Endpoint;

/// Machines known by name, in name order.
#[derive(Debug, Default, Clone)]
pub struct MachineRegistry {
    pub machines: BTreeMap<String, MachineConfig>,
}

impl MachineRegistry {
    pub fn insert(&mut self, config: MachineConfig) {
        self.machines.insert(config.name.clone(), config);
    }

    pub fn get(&self, name: &str) -> Option<&MachineConfig> {
        self.machines.get(name)
    }
}

impl MachineConfig {
    pub fn endpoint(&self) -> anyhow::Result<Endpoint> {
        Endpoint::parse(&self.endpoint)
            .with_context(|| format!("machine {}: bad endpoint", self.name))
    }

    /// Check what serde cannot: endpoint syntax and livebit settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.endpoint()?;
        let livebit = &self.session.livebit;
        if livebit.candidates.is_empty() {
            bail!("machine {}: no livebit candidates", self.name);
        }
        if livebit.interval_ms == 0 {
            bail!("machine {}: livebit interval must be positive", self.name);
        }
        Ok(())
    }
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<MachineConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading machine config: {}", path.display()))?;
    let val: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    let config: MachineConfig = serde_yaml::from_value(val)
        .with_context(|| format!("decoding machine config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating: {}", path.display()))?;
    Ok(config)
}

/// Load every `*.yml` / `*.yaml` file of `dir` in file name order.
pub fn load_configs_dir(dir: impl AsRef<Path>) -> anyhow::Result<MachineRegistry> {
    let dir = dir.as_ref();
    let mut reg = MachineRegistry::default();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("listing configs: {}", dir.display()))?
    {
        let path = entry?.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let config = load_config_file(&p)?;
        if reg.machines.contains_key(&config.name) {
            bail!("duplicate machine name {} in {}", config.name, p.display());
        }
        reg.insert(config);
    }
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MachineKind, DEFAULT_BASE_NODE, LIVEBIT_INTERVAL_MS};
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn minimal_descriptor_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "pump.yaml",
            "name: pump\nkind: duo_mix\nendpoint: 10.129.4.73\n",
        );
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.kind, MachineKind::DuoMix);
        assert_eq!(cfg.session.base_node, DEFAULT_BASE_NODE);
        assert_eq!(cfg.session.livebit.extern_node, "Livebit2extern");
        assert_eq!(
            cfg.session.livebit.candidates,
            vec!["Livebit2machine", "Livebit2DuoMix"]
        );
        assert_eq!(cfg.session.livebit.interval_ms, LIVEBIT_INTERVAL_MS);
        assert_eq!(cfg.endpoint().unwrap().url(), "opc.tcp://10.129.4.73:4840");
    }

    #[test]
    fn overrides_are_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "head.yml",
            concat!(
                "name: head\n",
                "kind: printhead\n",
                "endpoint: opc.tcp://plc.local:4841/ua\n",
                "base_node: \"ns=2;s=GVL.\"\n",
                "livebit:\n",
                "  candidates: [Livebit2DuoMix]\n",
                "  interval_ms: 250\n",
            ),
        );
        let cfg = load_config_file(&path).unwrap();
        assert_eq!(cfg.session.base_node, "ns=2;s=GVL.");
        assert_eq!(cfg.session.livebit.candidates, vec!["Livebit2DuoMix"]);
        assert_eq!(cfg.session.livebit.interval_ms, 250);
        assert_eq!(cfg.endpoint().unwrap().url(), "opc.tcp://plc.local:4841/ua");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.yaml",
            "name: bad\nkind: smp\nendpoint: http://x\n",
        );
        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad endpoint"));
    }

    #[test]
    fn directory_loads_in_sorted_order_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "b.yaml",
            "name: b\nkind: dosingpump\nendpoint: 10.0.0.2\n",
        );
        write(dir.path(), "a.yml", "name: a\nkind: smp\nendpoint: 10.0.0.1\n");
        write(dir.path(), "notes.txt", "not yaml: [");
        let reg = load_configs_dir(dir.path()).unwrap();
        let names: Vec<_> = reg.machines.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(reg.get("b").unwrap().kind, MachineKind::Dosingpump);
    }

    #[test]
    fn duplicate_names_fail() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.yaml", "name: x\nkind: smp\nendpoint: 10.0.0.1\n");
        write(dir.path(), "2.yaml", "name: x\nkind: smp\nendpoint: 10.0.0.2\n");
        assert!(load_configs_dir(dir.path()).is_err());
    }
}
