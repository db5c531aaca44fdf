use crate::detectors::ecg::DetectorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything an analysis run can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub bridge: BridgeConfig,
    pub limits: LimitsConfig,
}

/// External analyzer settings. `enabled` is the single switch deciding whether
/// the analyzer runs at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "beatscope".into(),
            args: vec!["reference-analyzer".into()],
            timeout_ms: 10_000,
        }
    }
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted input, in bytes.
    pub max_input_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 50 * 1024 * 1024,
        }
    }
}

pub fn parse_config(text: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = toml::from_str(text).context("parsing pipeline config")?;
    validate(&config)?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<PipelineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

fn validate(config: &PipelineConfig) -> Result<()> {
    let det = &config.detector;
    let spans = [
        ("refractory_s", det.refractory_s),
        ("qs_window_s", det.qs_window_s),
        ("p_window_s", det.p_window_s),
        ("t_window_s", det.t_window_s),
    ];
    for (name, value) in spans {
        if !value.is_finite() || value < 0.0 {
            anyhow::bail!("detector.{} must be a non-negative number, got {}", name, value);
        }
    }
    if !(0.0..=1.0).contains(&det.threshold_ratio) {
        anyhow::bail!(
            "detector.threshold_ratio must be within [0, 1], got {}",
            det.threshold_ratio
        );
    }
    let sigma_ok = det.anomaly_sigma.is_finite() && det.anomaly_sigma >= 0.0;
    let score_ok = det.score_sigma.is_finite() && det.score_sigma > 0.0;
    if !sigma_ok || !score_ok {
        anyhow::bail!("detector.anomaly_sigma must be >= 0 and detector.score_sigma > 0");
    }
    if config.bridge.enabled && config.bridge.command.trim().is_empty() {
        anyhow::bail!("bridge.command must be set when the bridge is enabled");
    }
    Ok(())
}
