use std::collections::HashMap;

use schnapsen_bot::{Bot, HeuristicBot};
use schnapsen_core::model::perspective::PlayerPerspective;
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};

/// Builds a fresh player for one game from a per-game seed.
pub type AgentFactory<P> = Box<dyn Fn(u64) -> Box<dyn Bot<P>>>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent '{0}' is not defined in the configuration")]
    UnknownAgent(String),
    #[error("external agent '{name}' has no registered factory")]
    Unregistered { name: String },
    #[error("agent '{name}' is built in and cannot be replaced")]
    NotExternal { name: String },
    #[error("invalid heuristic parameter for agent '{name}': {message}")]
    InvalidHeuristicParam { name: String, message: String },
}

/// Name-indexed set of players a series can seat.
pub struct AgentRoster<P> {
    entries: HashMap<String, AgentEntry<P>>,
}

enum AgentEntry<P> {
    Heuristic(HeuristicOptions),
    External(Option<AgentFactory<P>>),
}

impl<P: PlayerPerspective + 'static> AgentRoster<P> {
    /// Heuristic agents are ready immediately; external ones wait for [`AgentRoster::register`].
    pub fn from_configs(configs: &[AgentConfig]) -> Result<Self, AgentError> {
        let mut entries = HashMap::with_capacity(configs.len());
        for config in configs {
            let entry = match config.kind {
                AgentKind::Heuristic => AgentEntry::Heuristic(HeuristicOptions::from_params(
                    &config.name,
                    &config.params,
                )?),
                AgentKind::External => AgentEntry::External(None),
            };
            entries.insert(config.name.clone(), entry);
        }
        Ok(Self { entries })
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), AgentError>
    where
        F: Fn(u64) -> Box<dyn Bot<P>> + 'static,
    {
        match self.entries.get_mut(name) {
            Some(AgentEntry::External(slot)) => {
                *slot = Some(Box::new(factory));
                Ok(())
            }
            Some(AgentEntry::Heuristic(_)) => Err(AgentError::NotExternal {
                name: name.to_string(),
            }),
            None => Err(AgentError::UnknownAgent(name.to_string())),
        }
    }

    pub fn is_ready(&self, name: &str) -> Result<(), AgentError> {
        match self.entries.get(name) {
            Some(AgentEntry::Heuristic(_)) | Some(AgentEntry::External(Some(_))) => Ok(()),
            Some(AgentEntry::External(None)) => Err(AgentError::Unregistered {
                name: name.to_string(),
            }),
            None => Err(AgentError::UnknownAgent(name.to_string())),
        }
    }

    pub fn spawn(&self, name: &str, seed: u64) -> Result<Box<dyn Bot<P>>, AgentError> {
        match self.entries.get(name) {
            Some(AgentEntry::Heuristic(options)) => Ok(Box::new(HeuristicBot::from_seed(
                name,
                options.seed.unwrap_or(seed),
            ))),
            Some(AgentEntry::External(Some(factory))) => Ok(factory(seed)),
            Some(AgentEntry::External(None)) => Err(AgentError::Unregistered {
                name: name.to_string(),
            }),
            None => Err(AgentError::UnknownAgent(name.to_string())),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct HeuristicOptions {
    seed: Option<u64>,
}

impl HeuristicOptions {
    fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        if params.is_null() {
            return Ok(Self::default());
        }

        let mapping = params
            .as_mapping()
            .ok_or_else(|| AgentError::InvalidHeuristicParam {
                name: name.to_string(),
                message: "expected mapping for heuristic params".to_string(),
            })?;

        let mut options = Self::default();
        for (key, value) in mapping {
            match key.as_str() {
                Some("seed") => {
                    let seed = value
                        .as_u64()
                        .ok_or_else(|| AgentError::InvalidHeuristicParam {
                            name: name.to_string(),
                            message: "seed must be a non-negative integer".to_string(),
                        })?;
                    options.seed = Some(seed);
                }
                Some(other) => {
                    return Err(AgentError::InvalidHeuristicParam {
                        name: name.to_string(),
                        message: format!("unknown parameter '{other}'"),
                    });
                }
                None => {
                    return Err(AgentError::InvalidHeuristicParam {
                        name: name.to_string(),
                        message: "parameter keys must be strings".to_string(),
                    });
                }
            }
        }
        Ok(options)
    }
}
