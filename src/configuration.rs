use std::path::Path;
use std::time::Duration;

use crate::kubernetes::model::{ClusterContext, Namespace};
use crate::reconciler::retry::Backoff;

// YAML specific configuration

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub steps: u32,
    pub initial_delay_millis: u64,
    pub factor: f64,
    pub max_delay_millis: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            steps: 5,
            initial_delay_millis: 10,
            factor: 1.0,
            max_delay_millis: None,
        }
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(value: &RetryConfig) -> Self {
        Backoff {
            steps: value.steps,
            duration: Duration::from_millis(value.initial_delay_millis),
            factor: value.factor,
            cap: value.max_delay_millis.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub context: Option<ClusterContext>,
    #[serde(default)]
    pub namespace: Namespace,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_log_filter() -> String {
    String::from("info")
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            context: None,
            namespace: Namespace::default(),
            log_filter: default_log_filter(),
            retry: RetryConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Command line values win over the file.
    pub fn with_overrides(
        mut self,
        context: Option<String>,
        namespace: Option<String>,
    ) -> ReconcilerConfig {
        if let Some(context) = context {
            self.context = Some(ClusterContext(context));
        }
        if let Some(namespace) = namespace {
            self.namespace = Namespace(namespace);
        }
        self
    }

    pub fn backoff(&self) -> Backoff {
        (&self.retry).into()
    }
}

pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<ReconcilerConfig> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(ReconcilerConfig::default());
    }
    // Workaround for merge anchors.
    // https://github.com/dtolnay/serde-yaml/issues/317
    let mut yaml_value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
    yaml_value.apply_merge()?;
    Ok(serde_yaml::from_value(yaml_value)?)
}
