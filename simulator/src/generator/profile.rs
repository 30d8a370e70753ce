use crate::generator::template::baseline;
use anyhow::{bail, Context};
use guardcore::{Event, RawValue};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Adversarial batch shapes the driver knows how to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Mix of parseable text, garbage strings, NaN and missing fields.
    Corrupt,
    /// Every reading identical.
    Flat,
    /// Baseline with rare huge spikes of both signs.
    #[default]
    HeavyTail,
    /// 95% near 1000 with a coherent 5% minority near 50.
    Minority,
    /// Ten batches' worth of events in one call.
    Flood,
    /// Jittered timestamps arriving out of order.
    Drift,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::Corrupt,
        ScenarioKind::Flat,
        ScenarioKind::HeavyTail,
        ScenarioKind::Minority,
        ScenarioKind::Flood,
        ScenarioKind::Drift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Corrupt => "corrupt",
            ScenarioKind::Flat => "flat",
            ScenarioKind::HeavyTail => "heavy-tail",
            ScenarioKind::Minority => "minority",
            ScenarioKind::Flood => "flood",
            ScenarioKind::Drift => "drift",
        }
    }
}

const FLOOD_FACTOR: usize = 10;
const MINORITY_SHARE: f64 = 0.05;
const MAX_BATCH_SIZE: usize = 100_000;
const MAX_MAGNITUDE: f64 = 1.0e9;

/// Configuration for generating one synthetic batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub scenario: ScenarioKind,
    pub batch_size: usize,
    pub level: f64,
    pub noise: f64,
    pub seed: u64,
    /// Timestamp of the first event.
    pub start_time: f64,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            scenario: ScenarioKind::default(),
            batch_size: 64,
            level: 100.0,
            noise: 2.0,
            seed: 0,
            start_time: 0.0,
            description: None,
        }
    }
}

impl GeneratorConfig {
    fn normalized_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Rejects settings that would exhaust memory or overflow the sampler.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size > MAX_BATCH_SIZE {
            bail!("batch_size {} exceeds {}", self.batch_size, MAX_BATCH_SIZE);
        }
        if !(0.0..=MAX_MAGNITUDE).contains(&self.noise) {
            bail!("noise {} must be within [0, {:e}]", self.noise, MAX_MAGNITUDE);
        }
        if !(self.level.is_finite() && self.level.abs() <= MAX_MAGNITUDE) {
            bail!("level {} must be finite and within {:e}", self.level, MAX_MAGNITUDE);
        }
        if !self.start_time.is_finite() {
            bail!("start_time {} must be finite", self.start_time);
        }
        Ok(())
    }
}

fn timestamped(values: Vec<f64>, start: f64) -> Vec<Event> {
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| Event::new(value, start + idx as f64))
        .collect()
}

fn corrupt_batch(config: &GeneratorConfig, rng: &mut StdRng) -> Vec<Event> {
    let size = config.normalized_size();
    let clean = baseline(rng, size, config.level, config.noise);
    clean
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let ts = config.start_time + idx as f64;
            match rng.gen_range(0..8) {
                0 => Event::new(format!(" {:.3} ", value), ts),
                1 => Event::new("ERR", ts),
                2 => Event::new("NaN", ts),
                3 => Event::new(RawValue::Missing, ts),
                4 => Event::new(value, "not-a-time"),
                5 => Event::new(RawValue::Unsupported(serde_json::Value::Bool(true)), ts),
                _ => Event::new(value, ts),
            }
        })
        .collect()
}

fn heavy_tail_batch(config: &GeneratorConfig, rng: &mut StdRng) -> Vec<Event> {
    let size = config.normalized_size();
    let values = baseline(rng, size, config.level, config.noise)
        .into_iter()
        .map(|value| {
            if rng.gen_bool(0.08) {
                let magnitude = config.level.abs().max(1.0) * rng.gen_range(20.0..200.0);
                if rng.gen_bool(0.5) {
                    magnitude
                } else {
                    -magnitude
                }
            } else {
                value
            }
        })
        .collect();
    timestamped(values, config.start_time)
}

fn minority_batch(config: &GeneratorConfig, rng: &mut StdRng) -> Vec<Event> {
    let size = config.normalized_size();
    let minority = ((size as f64 * MINORITY_SHARE).ceil() as usize).min(size);
    let mut values: Vec<(f64, bool)> = baseline(rng, size - minority, 1000.0, config.noise)
        .into_iter()
        .map(|value| (value, false))
        .collect();
    values.extend(
        baseline(rng, minority, 50.0, config.noise * 0.25)
            .into_iter()
            .map(|value| (value, true)),
    );
    values.shuffle(rng);

    values
        .into_iter()
        .enumerate()
        .map(|(idx, (value, is_minority))| {
            let event = Event::new(value, config.start_time + idx as f64);
            if is_minority {
                event.with_tag("minority")
            } else {
                event
            }
        })
        .collect()
}

fn flood_batch(config: &GeneratorConfig, rng: &mut StdRng) -> anyhow::Result<Vec<Event>> {
    let size = config
        .normalized_size()
        .checked_mul(FLOOD_FACTOR)
        .context("overflow computing flood batch size")?;
    Ok(timestamped(
        baseline(rng, size, config.level, config.noise),
        config.start_time,
    ))
}

fn drift_batch(config: &GeneratorConfig, rng: &mut StdRng) -> Vec<Event> {
    let size = config.normalized_size();
    baseline(rng, size, config.level, config.noise)
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let jitter = rng.gen_range(-3.0..3.0);
            Event::new(value, config.start_time + idx as f64 + jitter)
        })
        .collect()
}

pub fn build_batch_from_config(config: &GeneratorConfig) -> anyhow::Result<Vec<Event>> {
    config.validate().context("invalid generator config")?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let events = match config.scenario {
        ScenarioKind::Corrupt => corrupt_batch(config, &mut rng),
        ScenarioKind::Flat => timestamped(
            vec![config.level; config.normalized_size()],
            config.start_time,
        ),
        ScenarioKind::HeavyTail => heavy_tail_batch(config, &mut rng),
        ScenarioKind::Minority => minority_batch(config, &mut rng),
        ScenarioKind::Flood => flood_batch(config, &mut rng)?,
        ScenarioKind::Drift => drift_batch(config, &mut rng),
    };
    Ok(events)
}

#[cfg(test)]
pub fn build_batch(scenario: ScenarioKind, batch_size: usize, seed: u64) -> anyhow::Result<Vec<Event>> {
    let config = GeneratorConfig {
        scenario,
        batch_size,
        seed,
        ..Default::default()
    };
    build_batch_from_config(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardcore::processing::sanitizer::decode;

    #[test]
    fn generator_builds_expected_batch_sizes() {
        for scenario in ScenarioKind::ALL {
            let events = build_batch(scenario, 40, 1).unwrap();
            let expected = if scenario == ScenarioKind::Flood { 400 } else { 40 };
            assert_eq!(events.len(), expected, "{}", scenario.name());
        }
    }

    #[test]
    fn same_seed_repeats_the_batch() {
        let first = build_batch(ScenarioKind::HeavyTail, 64, 9).unwrap();
        let second = build_batch(ScenarioKind::HeavyTail, 64, 9).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, build_batch(ScenarioKind::HeavyTail, 64, 10).unwrap());
    }

    #[test]
    fn corrupt_batch_contains_undecodable_rows() {
        let events = build_batch(ScenarioKind::Corrupt, 200, 4).unwrap();
        let decodable = events
            .iter()
            .filter(|event| decode(&event.value).is_some() && decode(&event.timestamp).is_some())
            .count();
        assert!(decodable > 0);
        assert!(decodable < events.len());
    }

    #[test]
    fn minority_batch_tags_five_percent_near_fifty() {
        let events = build_batch(ScenarioKind::Minority, 100, 2).unwrap();
        let minority: Vec<&Event> = events
            .iter()
            .filter(|event| event.tag.as_deref() == Some("minority"))
            .collect();
        assert_eq!(minority.len(), 5);
        assert!(minority
            .iter()
            .all(|event| decode(&event.value).map_or(false, |v| (v - 50.0).abs() < 2.0)));
    }

    #[test]
    fn drift_batch_arrives_out_of_order() {
        let events = build_batch(ScenarioKind::Drift, 64, 5).unwrap();
        let stamps: Vec<f64> = events.iter().filter_map(|e| decode(&e.timestamp)).collect();
        assert!(stamps.windows(2).any(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn hostile_settings_are_refused_before_generating() {
        let hostile = [
            GeneratorConfig {
                noise: 1.0e308,
                ..Default::default()
            },
            GeneratorConfig {
                noise: f64::INFINITY,
                ..Default::default()
            },
            GeneratorConfig {
                level: f64::NAN,
                ..Default::default()
            },
            GeneratorConfig {
                batch_size: usize::MAX,
                scenario: ScenarioKind::Flood,
                ..Default::default()
            },
        ];
        for config in &hostile {
            let err = build_batch_from_config(config).unwrap_err();
            assert!(format!("{:#}", err).contains("invalid generator config"));
        }
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn scenario_names_match_serde() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"scenario": "heavy-tail", "batch_size": 8}"#).unwrap();
        assert_eq!(config.scenario, ScenarioKind::HeavyTail);
        assert_eq!(config.level, 100.0);
        for scenario in ScenarioKind::ALL {
            let encoded = serde_json::to_string(&scenario).unwrap();
            assert_eq!(encoded, format!("\"{}\"", scenario.name()));
        }
    }
}
