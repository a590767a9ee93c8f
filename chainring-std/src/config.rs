//! Startup configuration.
//!
//! ```toml
//! name = "orders"
//! ring_buffer_size = 1024
//! producer = "multi"
//! wait_strategy = "busy-spin"
//!
//! [[stages]]
//! name = "validate"
//! priority = 0
//! rules = [
//!     { pattern = "/order/**", handlers = "trace, validate" },
//! ]
//!
//! [[stages]]
//! name = "store"
//! priority = 1
//! definitions = """
//! [rules]
//! /order/created/* = persist, notify
//! """
//! ```

use crate::bus::{ProducerType, WaitStrategy};
use crate::rules::{Rule, RuleSet};
use chainring_core::{ChainringError, CompileError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of ring slots.
pub const DEFAULT_RING_BUFFER_SIZE: usize = 1024;

/// Default engine name, used in logs.
pub const DEFAULT_ENGINE_NAME: &str = "chainring";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for [`EngineConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The ring buffer size is zero or not a power of two.
    #[error("ring_buffer_size must be a power of two, got {0}")]
    InvalidRingBufferSize(usize),

    /// Two stage definitions share a name.
    #[error("stage `{0}` is defined more than once")]
    DuplicateStage(String),
}

impl From<ConfigError> for ChainringError {
    fn from(err: ConfigError) -> Self {
        ChainringError::Custom(Box::new(err))
    }
}

/// Configuration of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine name, used in logs.
    pub name: String,
    /// Number of ring slots. Must be a power of two.
    pub ring_buffer_size: usize,
    /// Producer concurrency mode.
    pub producer: ProducerType,
    /// How workers wait for events.
    pub wait_strategy: WaitStrategy,
    /// Stage definitions, in declaration order.
    pub stages: Vec<StageDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ENGINE_NAME.to_string(),
            ring_buffer_size: DEFAULT_RING_BUFFER_SIZE,
            producer: ProducerType::default(),
            wait_strategy: WaitStrategy::default(),
            stages: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Default settings with no stages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading engine configuration");
        Self::from_toml_str(&text)
    }

    /// Check the invariants deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_buffer_size == 0 || !self.ring_buffer_size.is_power_of_two() {
            return Err(ConfigError::InvalidRingBufferSize(self.ring_buffer_size));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
        }
        Ok(())
    }

    /// Set the engine name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the ring size. Must be a power of two.
    pub fn with_ring_buffer_size(mut self, size: usize) -> Self {
        self.ring_buffer_size = size;
        self
    }

    /// Set the producer type.
    pub fn with_producer(mut self, producer: ProducerType) -> Self {
        self.producer = producer;
        self
    }

    /// Set how idle consumers wait.
    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategy) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    /// Append a stage definition.
    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }
}

/// One `pattern = handlers` entry of a pre-built mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Ant-style pattern.
    pub pattern: String,
    /// Comma-separated handler names.
    pub handlers: String,
}

/// A stage: a rule set and a priority.
///
/// Rules come from a pre-built mapping, a textual block, or both. The
/// mapping is merged first; the textual block wins on shared patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageDefinition {
    /// Unique stage id.
    pub name: String,
    /// Lower priorities run first.
    #[serde(default)]
    pub priority: i32,
    /// Textual rule block, `pattern = h1, h2` per line.
    #[serde(default)]
    pub definitions: Option<String>,
    /// Section of `definitions` to read.
    #[serde(default)]
    pub section: Option<String>,
    /// Pre-built mapping, in declaration order.
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl StageDefinition {
    /// A stage with priority 0 and no rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            definitions: None,
            section: None,
            rules: Vec::new(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the textual rule block.
    pub fn with_definitions(mut self, text: impl Into<String>) -> Self {
        self.definitions = Some(text.into());
        self
    }

    /// Read `section` of the textual block instead of `[rules]`.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Append a mapping entry.
    pub fn with_rule(mut self, pattern: impl Into<String>, handlers: impl Into<String>) -> Self {
        self.rules.push(RuleEntry {
            pattern: pattern.into(),
            handlers: handlers.into(),
        });
        self
    }

    /// The stage's rules: mapping first, then the textual block.
    pub fn rule_set(&self) -> Result<RuleSet, CompileError> {
        let mut rules = RuleSet::new();
        for entry in &self.rules {
            rules.insert(Rule::parse(entry.pattern.as_str(), &entry.handlers)?);
        }
        if let Some(text) = &self.definitions {
            rules.merge(RuleSet::parse(text, self.section.as_deref())?);
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        name = "orders"
        ring_buffer_size = 256
        producer = "multi"
        wait_strategy = "busy-spin"

        [[stages]]
        name = "check"
        rules = [
            { pattern = "/order/**", handlers = "validate" },
            { pattern = "/user/*/*", handlers = "audit" },
        ]
        definitions = """
        [rules]
        /order/** = validate, persist
        """

        [[stages]]
        name = "store"
        priority = 1
        section = "store"
        definitions = """
        [store]
        /** = persist
        """
    "#;

    #[test]
    fn parses_full_document() {
        let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.name, "orders");
        assert_eq!(config.ring_buffer_size, 256);
        assert_eq!(config.producer, ProducerType::Multi);
        assert_eq!(config.wait_strategy, WaitStrategy::BusySpin);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[1].priority, 1);
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.ring_buffer_size, DEFAULT_RING_BUFFER_SIZE);
        assert_eq!(config.producer, ProducerType::Single);
        assert_eq!(config.wait_strategy, WaitStrategy::SpinLoopHint);
    }

    #[test]
    fn textual_block_overrides_mapping() {
        let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
        let rules = config.stages[0].rule_set().unwrap();
        let collected: Vec<_> = rules
            .iter()
            .map(|r| (r.pattern.as_str(), r.handlers.join(",")))
            .collect();
        assert_eq!(
            collected,
            vec![
                ("/order/**", "validate,persist".to_string()),
                ("/user/*/*", "audit".to_string())
            ]
        );

        let store = config.stages[1].rule_set().unwrap();
        assert_eq!(store.iter().next().unwrap().pattern, "/**");
    }

    #[test]
    fn rejects_invalid_documents() {
        assert!(matches!(
            EngineConfig::from_toml_str("ring_buffer_size = 1000"),
            Err(ConfigError::InvalidRingBufferSize(1000))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("ring_buffer_sise = 1024"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[[stages]]\nname = \"a\"\n[[stages]]\nname = \"a\""),
            Err(ConfigError::DuplicateStage(name)) if name == "a"
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
