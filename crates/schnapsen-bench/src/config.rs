use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_SEAT_ORDERS: usize = 2;
const MAX_SEAT_ORDERS: usize = 2;
const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub series: SeriesConfig,
    pub agents: Vec<AgentConfig>,
    pub matchups: Vec<MatchupConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchmarkConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.series.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        validate_agents(&mut self.agents)?;
        validate_matchups(&self.matchups, &self.agents)?;
        self.metrics.validate(&self.matchups)?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            plots_dir: resolve_template(&self.run_id, &self.outputs.plots_dir),
        }
    }

    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn matchup(&self, id: &str) -> Option<&MatchupConfig> {
        self.matchups.iter().find(|matchup| matchup.id == id)
    }
}

/// How many games each matchup plays and how they are seeded.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SeriesConfig {
    pub seed: Option<u64>,
    pub games: usize,
    #[serde(default = "default_seat_orders")]
    pub seat_orders: usize,
}

impl SeriesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.games == 0 {
            return Err(ValidationError::InvalidField {
                field: "series.games".to_string(),
                message: "number of games must be greater than zero".to_string(),
            });
        }

        if self.seat_orders == 0 || self.seat_orders > MAX_SEAT_ORDERS {
            return Err(ValidationError::InvalidField {
                field: "series.seat_orders".to_string(),
                message: format!("seat orders must be between 1 and {MAX_SEAT_ORDERS}"),
            });
        }

        Ok(())
    }
}

fn default_seat_orders() -> usize {
    DEFAULT_SEAT_ORDERS
}

/// Definition of a series participant.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Built from this workspace's heuristic policy.
    Heuristic,
    /// Supplied by the caller through the agent roster.
    External,
}

/// One head-to-head series: `agent` is the side whose win rate is reported.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MatchupConfig {
    pub id: String,
    pub agent: String,
    pub opponent: String,
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub plots_dir: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.plots_dir", &self.plots_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Metrics configuration block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    #[serde(default)]
    pub comparisons: Vec<ComparisonConfig>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            comparisons: Vec::new(),
        }
    }
}

impl MetricsConfig {
    fn validate(&self, matchups: &[MatchupConfig]) -> Result<(), ValidationError> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ValidationError::InvalidField {
                field: "metrics.significance_level".to_string(),
                message: "significance level must lie strictly between 0 and 1".to_string(),
            });
        }

        for comparison in &self.comparisons {
            for id in [&comparison.a, &comparison.b] {
                if !matchups.iter().any(|m| &m.id == id) {
                    return Err(ValidationError::InvalidField {
                        field: "metrics.comparisons".to_string(),
                        message: format!("matchup '{id}' is not defined in matchups list"),
                    });
                }
            }
            if comparison.a == comparison.b {
                return Err(ValidationError::InvalidField {
                    field: "metrics.comparisons".to_string(),
                    message: format!("matchup '{}' compared with itself", comparison.a),
                });
            }
        }

        Ok(())
    }
}

/// Pair of matchups whose agent win rates are tested for a difference.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ComparisonConfig {
    pub a: String,
    pub b: String,
}

fn default_significance_level() -> f64 {
    DEFAULT_SIGNIFICANCE_LEVEL
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_agents(agents: &mut [AgentConfig]) -> Result<(), ValidationError> {
    if agents.len() < 2 {
        return Err(ValidationError::InvalidField {
            field: "agents".to_string(),
            message: "at least two agents must be specified".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for agent in agents.iter_mut() {
        if agent.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "agents.name".to_string(),
                message: "agent name must not be empty".to_string(),
            });
        }

        if !agent.name.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
            return Err(ValidationError::InvalidField {
                field: format!("agents[{}].name", agent.name),
                message: "agent name contains invalid characters".to_string(),
            });
        }

        if !seen.insert(agent.name.clone()) {
            return Err(ValidationError::InvalidField {
                field: "agents".to_string(),
                message: format!("agent name '{}' defined more than once", agent.name),
            });
        }

        if agent.params.is_null() {
            agent.params = serde_yaml::Value::Mapping(Default::default());
        }
    }

    Ok(())
}

fn validate_matchups(
    matchups: &[MatchupConfig],
    agents: &[AgentConfig],
) -> Result<(), ValidationError> {
    if matchups.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "matchups".to_string(),
            message: "at least one matchup must be specified".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for matchup in matchups {
        if matchup.id.trim().is_empty() || !matchup.id.chars().all(|c| RUN_ID_ALLOWED.contains(c))
        {
            return Err(ValidationError::InvalidField {
                field: format!("matchups[{}].id", matchup.id),
                message: "matchup id must be non-empty and use alphanumeric, '.', '_' or '-'"
                    .to_string(),
            });
        }

        if !seen.insert(matchup.id.as_str()) {
            return Err(ValidationError::InvalidField {
                field: "matchups".to_string(),
                message: format!("matchup id '{}' defined more than once", matchup.id),
            });
        }

        for (role, name) in [("agent", &matchup.agent), ("opponent", &matchup.opponent)] {
            if !agents.iter().any(|a| &a.name == name) {
                return Err(ValidationError::InvalidField {
                    field: format!("matchups[{}].{role}", matchup.id),
                    message: format!("agent '{name}' is not defined in agents list"),
                });
            }
        }

        if matchup.agent == matchup.opponent {
            return Err(ValidationError::InvalidField {
                field: format!("matchups[{}]", matchup.id),
                message: "an agent cannot play against itself".to_string(),
            });
        }
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
