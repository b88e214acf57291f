use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use serde::Deserialize;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deserialize)]
pub struct ClusterContext(pub String);

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deserialize)]
pub struct Namespace(pub String);

impl Default for Namespace {
    fn default() -> Self {
        Namespace(String::from("default"))
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deserialize)]
pub struct DeploymentName(pub String);

impl DeploymentName {
    /// Name carried by the descriptor's metadata, if any.
    pub fn of(deployment: &Deployment) -> Option<DeploymentName> {
        deployment
            .metadata
            .name
            .as_ref()
            .filter(|name| !name.is_empty())
            .map(|name| DeploymentName(name.clone()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DeploymentName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How dependents of a deleted object are handled by the garbage collector.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Propagation {
    /// Dependents are removed before the owner is considered deleted.
    Foreground,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Api { code: u16, message: String },
    #[error("{0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(_))
    }
}

impl From<kube::Error> for ClientError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => ClientError::NotFound(ae.message),
            // 409 is shared with AlreadyExists; only a stale write is a conflict.
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "Conflict" => {
                ClientError::Conflict(ae.message)
            }
            kube::Error::Api(ae) => ClientError::Api {
                code: ae.code,
                message: ae.message,
            },
            other => ClientError::Transport(other.to_string()),
        }
    }
}

/// Deployment operations in a single, fixed namespace.
#[async_trait]
pub trait DeploymentsClient {
    async fn get(&self, name: &DeploymentName) -> Result<Deployment, ClientError>;

    async fn create(&self, deployment: &Deployment) -> Result<Deployment, ClientError>;

    /// Full update. Fails with `ClientError::Conflict` when the submitted
    /// resourceVersion is stale.
    async fn replace(
        &self,
        name: &DeploymentName,
        deployment: &Deployment,
    ) -> Result<Deployment, ClientError>;

    async fn delete(
        &self,
        name: &DeploymentName,
        propagation: Propagation,
    ) -> Result<(), ClientError>;
}
