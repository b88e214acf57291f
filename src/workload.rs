use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use serde::Deserialize;

use crate::reconciler::{DeploymentReconciler, Outcome};

/// Resource kinds this tool knows how to reconcile.
#[derive(Clone, Debug)]
pub enum Workload {
    Deployment(Box<Deployment>),
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("document {index}: unsupported kind {api_version}/{kind}")]
    UnsupportedKind {
        index: usize,
        api_version: String,
        kind: String,
    },
    #[error("document {index}: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
}

impl Workload {
    /// Decodes every non-empty YAML document of a manifest.
    pub fn from_yaml(manifest: &str) -> Result<Vec<Workload>, ManifestError> {
        let mut workloads = Vec::new();
        for (index, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
            let malformed = |source: serde_yaml::Error| ManifestError::Malformed { index, source };
            let value = serde_yaml::Value::deserialize(document).map_err(malformed)?;
            if value.is_null() {
                continue;
            }
            let type_meta: TypeMeta = serde_yaml::from_value(value.clone()).map_err(malformed)?;
            match (type_meta.api_version.as_str(), type_meta.kind.as_str()) {
                ("apps/v1", "Deployment") => {
                    let deployment: Deployment =
                        serde_yaml::from_value(value).map_err(malformed)?;
                    workloads.push(Workload::Deployment(Box::new(deployment)));
                }
                _ => {
                    return Err(ManifestError::UnsupportedKind {
                        index,
                        api_version: type_meta.api_version,
                        kind: type_meta.kind,
                    })
                }
            }
        }
        Ok(workloads)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Workload::Deployment(deployment) => deployment.metadata.name.as_deref(),
        }
    }
}

pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<Workload>, ManifestError> {
    let manifest = std::fs::read_to_string(path)?;
    Workload::from_yaml(&manifest)
}

/// Routes each workload to the reconciler for its kind.
pub struct Handlers {
    deployments: DeploymentReconciler,
}

impl Handlers {
    pub fn new(deployments: DeploymentReconciler) -> Handlers {
        Handlers { deployments }
    }

    pub async fn apply(&self, workload: &Workload) -> Outcome {
        match workload {
            Workload::Deployment(deployment) => self.deployments.apply(deployment).await,
        }
    }

    pub async fn delete(&self, workload: &Workload) -> Outcome {
        match workload {
            Workload::Deployment(deployment) => self.deployments.delete(deployment).await,
        }
    }
}
