use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::TICRATE;

/// Logger configuration for tools embedding the interpreter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level_filter: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { level_filter: LevelFilter::Info }
    }
}

/// Interpreter tuning. Every field falls back to its default when omitted
/// from a JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Tics an open script waits before its first instruction.
    pub open_script_delay: i32,
    /// Tics a deferred script waits after its map becomes current.
    pub deferred_start_delay: i32,
    /// Run deferred starts in deathmatch games too.
    pub deferred_in_deathmatch: bool,
    /// Upper bound on instructions one instance may run per tic. `None`
    /// keeps the classic unbounded behavior.
    pub instruction_budget: Option<usize>,
    pub logger_config: Option<LoggerConfig>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            open_script_delay: TICRATE,
            deferred_start_delay: TICRATE,
            deferred_in_deathmatch: false,
            instruction_budget: None,
            logger_config: Some(Default::default()),
        }
    }
}

impl InterpreterConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse interpreter config")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("load {:?}", path))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize interpreter config")
    }
}

/// Convenience builder for [`InterpreterConfig`].
#[derive(Default)]
pub struct InterpreterConfigBuilder {
    config: InterpreterConfig,
}

impl InterpreterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_script_delay(mut self, tics: i32) -> Self {
        self.config.open_script_delay = tics;
        self
    }

    pub fn with_deferred_start_delay(mut self, tics: i32) -> Self {
        self.config.deferred_start_delay = tics;
        self
    }

    pub fn with_deferred_in_deathmatch(mut self, enabled: bool) -> Self {
        self.config.deferred_in_deathmatch = enabled;
        self
    }

    pub fn with_instruction_budget(mut self, budget: usize) -> Self {
        self.config.instruction_budget = Some(budget);
        self
    }

    pub fn with_logger_config(mut self, logger_config: LoggerConfig) -> Self {
        self.config.logger_config = Some(logger_config);
        self
    }

    pub fn get(self) -> InterpreterConfig {
        self.config
    }
}
