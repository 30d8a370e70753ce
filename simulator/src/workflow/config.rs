use crate::generator::profile::{GeneratorConfig, ScenarioKind};
use anyhow::Context;
use guardcore::GuardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub guard: GuardConfig,
    pub batch_size: usize,
    /// Batches fed per scenario in an offline run.
    pub batches: usize,
    pub seed: u64,
    pub scenarios: Vec<ScenarioKind>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            batch_size: 64,
            batches: 4,
            seed: 0,
            scenarios: ScenarioKind::ALL.to_vec(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .guard
            .validate()
            .with_context(|| format!("validating guard section of {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(max_buffer: usize, batch_size: usize, batches: usize, seed: u64) -> Self {
        Self {
            guard: GuardConfig {
                max_buffer,
                stats_window: max_buffer,
                ..Default::default()
            },
            batch_size,
            batches,
            seed,
            ..Default::default()
        }
    }

    pub fn to_guard_config(&self) -> GuardConfig {
        self.guard.clone()
    }

    /// Generator settings for batch `index` of `scenario`. Every batch gets
    /// its own seed and continues the timeline of the batch before it.
    pub fn generator_for(&self, scenario: ScenarioKind, index: usize) -> GeneratorConfig {
        let defaults = GeneratorConfig::default();
        let span = match scenario {
            ScenarioKind::Flood => self.batch_size.saturating_mul(10),
            _ => self.batch_size,
        };
        GeneratorConfig {
            scenario,
            batch_size: self.batch_size,
            seed: self.seed.wrapping_add(index as u64),
            start_time: (index * span) as f64,
            description: Some(format!("{} batch {}", scenario.name(), index)),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_guard_config() {
        let cfg = WorkflowConfig::from_args(120, 32, 2, 7);
        let guard = cfg.to_guard_config();
        assert_eq!(guard.max_buffer, 120);
        assert_eq!(guard.stats_window, 120);
        assert!(guard.validate().is_ok());
        assert_eq!(cfg.scenarios.len(), ScenarioKind::ALL.len());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"batch_size: 16\nbatches: 3\nscenarios: [flat, heavy-tail]\nguard:\n  max_buffer: 50\n  z_threshold: 4.5\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.scenarios, vec![ScenarioKind::Flat, ScenarioKind::HeavyTail]);
        assert_eq!(cfg.guard.max_buffer, 50);
        assert_eq!(cfg.guard.z_threshold, 4.5);
        assert_eq!(cfg.guard.sane_ceiling, 900.0);
    }

    #[test]
    fn config_load_rejects_invalid_guard_section() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"guard:\n  max_buffer: 0\n").unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("validating guard section"));
    }

    #[test]
    fn generator_batches_advance_the_timeline() {
        let cfg = WorkflowConfig::from_args(240, 20, 3, 100);
        let second = cfg.generator_for(ScenarioKind::Drift, 1);
        assert_eq!(second.seed, 101);
        assert_eq!(second.start_time, 20.0);
        assert_eq!(cfg.generator_for(ScenarioKind::Flood, 2).start_time, 400.0);
    }
}
