use async_trait::async_trait;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{DeleteParams, PostParams, PropagationPolicy};
use kube_client::config::KubeConfigOptions;
use kube_client::{Api, Client, Config};

use crate::kubernetes::model::{
    ClientError, ClusterContext, DeploymentName, DeploymentsClient, Namespace, Propagation,
};

/// Builds a client from the local kubeconfig, optionally pinned to one context.
pub async fn connect(context: Option<&ClusterContext>) -> anyhow::Result<Client> {
    let context_options = KubeConfigOptions {
        context: context.map(|ctx| ctx.0.clone()),
        ..Default::default()
    };
    let config = Config::from_kubeconfig(&context_options).await?;
    Ok(Client::try_from(config)?)
}

pub struct KubeRsBased {
    deployments: Api<Deployment>,
}

impl KubeRsBased {
    pub fn new(client: Client, namespace: &Namespace) -> KubeRsBased {
        KubeRsBased {
            deployments: Api::namespaced(client, namespace.0.as_str()),
        }
    }
}

fn delete_params(propagation: Propagation) -> DeleteParams {
    let policy = match propagation {
        Propagation::Foreground => PropagationPolicy::Foreground,
    };
    DeleteParams {
        propagation_policy: Some(policy),
        ..Default::default()
    }
}

#[async_trait]
impl DeploymentsClient for KubeRsBased {
    async fn get(&self, name: &DeploymentName) -> Result<Deployment, ClientError> {
        Ok(self.deployments.get(name.as_str()).await?)
    }

    async fn create(&self, deployment: &Deployment) -> Result<Deployment, ClientError> {
        Ok(self
            .deployments
            .create(&PostParams::default(), deployment)
            .await?)
    }

    async fn replace(
        &self,
        name: &DeploymentName,
        deployment: &Deployment,
    ) -> Result<Deployment, ClientError> {
        Ok(self
            .deployments
            .replace(name.as_str(), &PostParams::default(), deployment)
            .await?)
    }

    async fn delete(
        &self,
        name: &DeploymentName,
        propagation: Propagation,
    ) -> Result<(), ClientError> {
        self.deployments
            .delete(name.as_str(), &delete_params(propagation))
            .await?;
        Ok(())
    }
}
