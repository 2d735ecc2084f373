//! Loader for the chitter configuration with YAML + environment overlays.
//!
//! A `chitter.yaml` file provides the base settings; `CHITTER_`-prefixed
//! environment variables override individual keys, and `${VAR}` placeholders
//! inside string values are expanded (recursively, depth-capped) so
//! credentials can stay out of the file.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Top-level runtime configuration for the poller.
#[derive(Debug, Deserialize)]
pub struct ChitterConfig {
    pub platform: PlatformConfig,
    /// Account-list references whose members are polled in addition to
    /// the operator's follow graph.
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// sqlx connection string, e.g. `sqlite://data/chitter.db`.
    pub database_url: String,
    pub feed: FeedConfig,
}

/// Credentials and identity for the polled platform.
#[derive(Debug, Deserialize)]
pub struct PlatformConfig {
    pub bearer_token: String,
    /// The operator's own account id; its follow graph defines the
    /// baseline tracked-account set.
    pub self_account_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Thresholds and cadence for the ingestion/publication cycle.
#[derive(Debug, Deserialize)]
pub struct IngestConfig {
    /// Distinct sharers required before a URL may be published.
    #[serde(default = "default_min_sharer_count")]
    pub min_sharer_count: u32,
    /// Upper bound on entries published per cycle.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_sharer_count: default_min_sharer_count(),
            max_batch: default_max_batch(),
            poll_interval_minutes: default_poll_interval_minutes(),
        }
    }
}

/// Rendering settings for the published RSS document.
#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Public URL the feed's channel element links back to.
    pub site_url: String,
    pub output_path: PathBuf,
    /// Newest-first entries included when rendering.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_api_base() -> String {
    "https://api.twitter.com".into()
}
fn default_min_sharer_count() -> u32 {
    3
}
fn default_max_batch() -> usize {
    20
}
fn default_poll_interval_minutes() -> u64 {
    30
}
fn default_max_items() -> usize {
    50
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML file + env overrides).
pub struct ChitterConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ChitterConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChitterConfigLoader {
    /// Start with the defaults: `CHITTER_` env overrides, `__` separator.
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("CHITTER").separator("__"));
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet (tests and CLI overrides).
    ///
    /// ```
    /// use chitter_config::ChitterConfigLoader;
    ///
    /// let cfg = ChitterConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// platform:
    ///   bearer_token: "token"
    ///   self_account_id: "99"
    /// database_url: "sqlite::memory:"
    /// feed:
    ///   title: "chitter"
    ///   site_url: "https://example.org/chitter"
    ///   output_path: "feed.xml"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.platform.self_account_id, "99");
    /// assert_eq!(cfg.ingest.min_sharer_count, 3);
    /// assert!(cfg.lists.is_empty());
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and deserialize.
    pub fn load(self) -> Result<ChitterConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Round-trip through serde_json::Value so env expansion can walk
        // arbitrarily nested strings before the typed deserialize.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ChitterConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(typed)
    }
}
