//! Process configuration for the `taskpipe` binary.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags (applied by the binary).
//! Loads once at startup and fails fast on malformed values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// How stdin is split into raw input values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenizer {
    /// One value per line.
    Lines,
    /// One value per whitespace-separated word.
    Words,
}

impl std::str::FromStr for Tokenizer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lines" => Ok(Tokenizer::Lines),
            "words" => Ok(Tokenizer::Words),
            other => Err(Error::Config(format!(
                "unknown tokenizer {other:?} (expected \"lines\" or \"words\")"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workers: isize,
    pub timeout: Duration,
    pub queue_capacity: usize,
    pub tokenizer: Tokenizer,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout: Duration::from_secs(3),
            queue_capacity: crate::pipeline::DEFAULT_QUEUE_CAPACITY,
            tokenizer: Tokenizer::Words,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

/// On-disk shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    workers: Option<isize>,
    timeout: Option<String>,
    queue_capacity: Option<usize>,
    tokenizer: Option<Tokenizer>,
    otel_endpoint: Option<String>,
    log_level: Option<String>,
}

impl Config {
    /// Defaults, overlaid with `path` (if given), overlaid with the environment.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with the environment only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Overlay the keys present in a TOML document.
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad config file: {e}")))?;

        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(timeout) = file.timeout {
            self.timeout = parse_duration(&timeout)?;
        }
        if let Some(capacity) = file.queue_capacity {
            self.queue_capacity = capacity.max(1);
        }
        if let Some(tokenizer) = file.tokenizer {
            self.tokenizer = tokenizer;
        }
        if file.otel_endpoint.is_some() {
            self.otel_endpoint = file.otel_endpoint;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.apply_toml(&content)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(workers) = optional_var("TASKPIPE_WORKERS") {
            self.workers = workers.trim().parse().map_err(|e| {
                Error::Config(format!("TASKPIPE_WORKERS={workers:?} is not an integer: {e}"))
            })?;
        }
        if let Some(timeout) = optional_var("TASKPIPE_TIMEOUT") {
            self.timeout = parse_duration(&timeout)?;
        }
        if let Some(capacity) = optional_var("TASKPIPE_QUEUE_CAPACITY") {
            let capacity: usize = capacity.trim().parse().map_err(|e| {
                Error::Config(format!(
                    "TASKPIPE_QUEUE_CAPACITY={capacity:?} is not a count: {e}"
                ))
            })?;
            self.queue_capacity = capacity.max(1);
        }
        if let Some(tokenizer) = optional_var("TASKPIPE_TOKENIZER") {
            self.tokenizer = tokenizer.parse()?;
        }
        if let Some(endpoint) = optional_var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        if let Some(level) = optional_var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }
}

/// Set and non-empty.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `500ms`, `3s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| Error::Config(format!("bad duration {raw:?}")))?;
    let secs = match unit.trim() {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => {
            return Err(Error::Config(format!(
                "bad duration {raw:?}: unknown unit {other:?}"
            )));
        }
    };

    Duration::try_from_secs_f64(secs).map_err(|e| Error::Config(format!("bad duration {raw:?}: {e}")))
}
