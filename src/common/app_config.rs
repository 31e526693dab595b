// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<LateralisConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static LateralisConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = LateralisConfig::load_from_file(&path)?;
    Ok(CONFIG.get_or_init(|| cfg))
}

pub fn init_from_env_or_default() -> Result<&'static LateralisConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    let cfg = LateralisConfig::load_from_file(&path)?;
    Ok(CONFIG.get_or_init(|| cfg))
}

/// Install built-in defaults unless a configuration is already loaded.
pub fn init_default() -> &'static LateralisConfig {
    CONFIG.get_or_init(LateralisConfig::default)
}

pub fn config() -> Result<&'static LateralisConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("LATERALIS_CONFIG") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let candidates = [PathBuf::from("lateralis.toml")];
    for p in candidates {
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "missing config file: set $LATERALIS_CONFIG or create ./lateralis.toml"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct LateralisConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "lateralis=debug,lateralis::exec::pipeline=info"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

impl LateralisConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parse toml: {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: LateralisConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The filter expression handed to the logging subscriber.
    pub fn effective_log_filter(&self) -> &str {
        match self.log_filter.as_deref() {
            Some(filter) if !filter.trim().is_empty() => filter,
            _ => &self.log_level,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.batch_size == 0 {
            return Err(anyhow!("runtime.batch_size must be positive"));
        }
        if self.runtime.pipeline_dop == 0 {
            return Err(anyhow!("runtime.pipeline_dop must be positive"));
        }
        Ok(())
    }
}

impl Default for LateralisConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum rows per output chunk when the query does not override it.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Number of parallel driver instances per pipeline.
    #[serde(default = "default_pipeline_dop")]
    pub pipeline_dop: usize,
}

fn default_batch_size() -> usize {
    4096
}

fn default_pipeline_dop() -> usize {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pipeline_dop: default_pipeline_dop(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DebugConfig {
    /// Log every chunk returned by exec operators at debug level.
    #[serde(default)]
    pub exec_node_output: bool,
    /// Upper bound on the parts `explode_split` emits per row. Zero means unlimited.
    #[serde(default)]
    pub explode_split_max_parts: usize,
}

#[cfg(test)]
mod tests {
    use super::LateralisConfig;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = LateralisConfig::parse("").expect("parse empty config");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.runtime.batch_size, 4096);
        assert_eq!(cfg.runtime.pipeline_dop, 1);
        assert!(!cfg.debug.exec_node_output);
        assert_eq!(cfg.effective_log_filter(), "info");
    }

    #[test]
    fn log_filter_takes_precedence_over_level() {
        let cfg = LateralisConfig::parse(
            r#"
log_level = "warn"
log_filter = "lateralis=trace"

[runtime]
batch_size = 16
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.effective_log_filter(), "lateralis=trace");
        assert_eq!(cfg.runtime.batch_size, 16);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = LateralisConfig::parse("[runtime]\nbatch_size = 0\n").expect_err("invalid");
        assert!(err.to_string().contains("batch_size"), "err={err}");
    }
}
