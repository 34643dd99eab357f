//! Structured simulation configuration, loaded at startup (spec §6). Out of
//! scope per spec §1 is the loader's surrounding CLI; this module only owns
//! the `serde`-deserializable shape and the thin TOML/JSON edges, following
//! the `PerfConfig`-style config structs in `cooprefr-bettersys`
//! (`rust-backend/src/performance/config.rs`): `#[serde(default)]` fields
//! throughout, a `Default` impl, and a `load` that reads a path.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// `market.*` (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Bar widths in simulation ticks.
    #[serde(default)]
    pub ohlcv_periods: Vec<u64>,
    /// Enables tick retention.
    #[serde(default)]
    pub store_tick_data: bool,
    /// Bound on the tick ring buffer when `store_tick_data` is set.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,
}

fn default_max_ticks() -> usize {
    10_000_000
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            ohlcv_periods: Vec::new(),
            store_tick_data: false,
            max_ticks: default_max_ticks(),
        }
    }
}

/// The tag naming an agent archetype's behavior (spec §6 `agents[].type`,
/// "tag from {zero_intelligence, fundamentalist, chartist, ...}"). Kept as a
/// plain string rather than a closed enum: the core treats it purely as a
/// label passed through to the external strategy collaborator — it does not
/// interpret per-type parameters beyond carrying them (spec §1 "concrete
/// agent strategy logic" is out of scope), and the `...` in spec §6 means
/// the set of tags isn't fixed here.
pub type AgentType = String;

/// One `agents[]` entry (spec §6): `id`, `type`, and per-type parameters.
/// Per-type parameters are left as an open `serde_json::Value` map since the
/// core doesn't interpret them — only external strategy code does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: u64,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Top-level configuration consumed at startup (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    /// Scheduling quantum.
    pub time_step: u64,
    /// Scheduling horizon.
    pub max_time: u64,
    /// Root RNG seed; every agent's own stream is derived from this plus its
    /// id (spec §9 "Random number generation").
    #[serde(default)]
    pub seed: u64,
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<SimulationConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(toml::from_str(&contents)?)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<SimulationConfig, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            time_step = 1
            max_time = 1000
            seed = 7

            [market]
            ohlcv_periods = [10, 100]
            store_tick_data = true

            [[agents]]
            id = 1
            type = "zero_intelligence"
            "#,
        )
        .unwrap();
        assert_eq!(config.time_step, 1);
        assert_eq!(config.max_time, 1000);
        assert_eq!(config.market.ohlcv_periods, vec![10, 100]);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].agent_type, "zero_intelligence");
    }

    #[test]
    fn market_defaults_when_omitted() {
        let config = SimulationConfig::from_toml_str("time_step = 1\nmax_time = 10\n").unwrap();
        assert!(config.market.ohlcv_periods.is_empty());
        assert!(!config.market.store_tick_data);
        assert_eq!(config.market.max_ticks, 10_000_000);
    }

    #[test]
    fn loads_from_a_toml_file_on_disk() {
        use std::io::Write;
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "time_step = 5\nmax_time = 500\n").unwrap();
        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(config.time_step, 5);
        assert_eq!(config.max_time, 500);
    }

    #[test]
    fn rejects_a_missing_file() {
        let err = SimulationConfig::load("/nonexistent/path/config.toml");
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}
