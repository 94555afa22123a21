use std::fs;
use std::path::Path;

use boa_engine::vm::RuntimeLimits;
use serde::Deserialize;
use tracing::{info, warn};

use crate::diagnostics::PacDomain;

const MAX_CONFIG_BYTES: u64 = 1024 * 1024;
const MAX_SCRIPT_BYTES: usize = 64 * 1024 * 1024;
const MAX_LOOP_ITERATIONS: u64 = 1_000_000_000;
const MAX_RECURSION_DEPTH: usize = 4_096;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Limits applied to every script an engine compiles.
///
/// The loop, recursion and stack limits are the execution bound: a script
/// that exceeds them fails with a runtime fault instead of running forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_script_bytes: usize,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_script_bytes: 1024 * 1024,
            loop_iteration_limit: 1_000_000,
            recursion_limit: 256,
            stack_size_limit: 512 * 1024,
        }
    }
}

impl EngineOptions {
    pub(crate) fn runtime_limits(&self) -> RuntimeLimits {
        let mut limits = RuntimeLimits::default();
        limits.set_loop_iteration_limit(self.loop_iteration_limit);
        limits.set_recursion_limit(self.recursion_limit);
        limits.set_stack_size_limit(self.stack_size_limit);
        limits
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub engine: Option<EngineConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct EngineConfig {
    pub max_script_bytes: Option<usize>,
    pub loop_iteration_limit: Option<u64>,
    pub recursion_limit: Option<usize>,
    pub stack_size_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    /// Load a TOML or YAML config file, chosen by extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > MAX_CONFIG_BYTES {
                return Err(anyhow::anyhow!(
                    "config {} exceeds {} bytes",
                    path.display(),
                    MAX_CONFIG_BYTES
                ));
            }
        }
        let data = fs::read_to_string(path)?;
        let cfg = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str::<Config>(&data)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str::<Config>(&data)?,
            _ => toml::from_str::<Config>(&data)
                .or_else(|_| serde_yaml::from_str::<Config>(&data))?,
        };
        Ok(cfg)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Overlay the configured values onto `opts`, skipping invalid ones.
    pub fn apply(&self, opts: &mut EngineOptions) {
        if let Some(engine) = &self.engine {
            apply_engine(engine, opts);
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        let mut opts = EngineOptions::default();
        self.apply(&mut opts);
        opts
    }
}

fn apply_engine(engine: &EngineConfig, opts: &mut EngineOptions) {
    if let Some(v) = engine.max_script_bytes {
        if v == 0 || v > MAX_SCRIPT_BYTES {
            warn!(domain = %PacDomain::Runtime, value = v, limit = MAX_SCRIPT_BYTES, "Invalid max_script_bytes in config");
        } else {
            info!(value = v, "Config override max_script_bytes");
            opts.max_script_bytes = v;
        }
    }
    if let Some(v) = engine.loop_iteration_limit {
        if v == 0 || v > MAX_LOOP_ITERATIONS {
            warn!(domain = %PacDomain::Runtime, value = v, limit = MAX_LOOP_ITERATIONS, "Invalid loop_iteration_limit in config");
        } else {
            info!(value = v, "Config override loop_iteration_limit");
            opts.loop_iteration_limit = v;
        }
    }
    if let Some(v) = engine.recursion_limit {
        if v == 0 || v > MAX_RECURSION_DEPTH {
            warn!(domain = %PacDomain::Runtime, value = v, limit = MAX_RECURSION_DEPTH, "Invalid recursion_limit in config");
        } else {
            info!(value = v, "Config override recursion_limit");
            opts.recursion_limit = v;
        }
    }
    if let Some(v) = engine.stack_size_limit {
        if v == 0 || v > MAX_STACK_SIZE {
            warn!(domain = %PacDomain::Runtime, value = v, limit = MAX_STACK_SIZE, "Invalid stack_size_limit in config");
        } else {
            info!(value = v, "Config override stack_size_limit");
            opts.stack_size_limit = v;
        }
    }
}
