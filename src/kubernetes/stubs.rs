use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use k8s_openapi::api::apps::v1::Deployment;

use crate::kubernetes::model::{ClientError, DeploymentName, DeploymentsClient, Propagation};

/// Finalizer prefix added by simulated concurrent writers.
pub const INTERLEAVED_FINALIZER: &str = "stubs.local/interleaved";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Get(String),
    Create(String),
    Replace(String),
    Delete(String, Propagation),
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Deployment>,
    calls: Vec<Call>,
    next_version: u64,
    get_failure: Option<ClientError>,
    // Number of gets that still succeed before `get_failure` kicks in.
    gets_before_failure: u32,
    create_failure: Option<ClientError>,
    delete_failure: Option<ClientError>,
    // Each pending entry simulates another writer updating the object right
    // before a replace lands, so the replace sees a stale resourceVersion.
    interleaved_writes: u32,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// In-memory cluster with optimistic concurrency on `metadata.resourceVersion`.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

fn name_of(deployment: &Deployment) -> String {
    deployment.metadata.name.clone().unwrap_or_default()
}

impl InMemoryCluster {
    pub fn new() -> InMemoryCluster {
        InMemoryCluster::default()
    }

    /// Seeds an object as if it had been created earlier, returning the stored copy.
    pub fn insert(&self, mut deployment: Deployment) -> Deployment {
        let mut state = self.state.lock().unwrap();
        deployment.metadata.resource_version = Some(state.bump_version());
        state
            .objects
            .insert(name_of(&deployment), deployment.clone());
        deployment
    }

    pub fn stored(&self, name: &str) -> Option<Deployment> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(*call)).count()
    }

    pub fn fail_gets_with(&self, error: ClientError) {
        self.fail_gets_after(0, error);
    }

    /// Lets the next `successful` gets through, then fails every later one.
    pub fn fail_gets_after(&self, successful: u32, error: ClientError) {
        let mut state = self.state.lock().unwrap();
        state.gets_before_failure = successful;
        state.get_failure = Some(error);
    }

    pub fn fail_creates_with(&self, error: ClientError) {
        self.state.lock().unwrap().create_failure = Some(error);
    }

    pub fn fail_deletes_with(&self, error: ClientError) {
        self.state.lock().unwrap().delete_failure = Some(error);
    }

    /// Makes the next `writes` replace calls race with a concurrent writer.
    pub fn interleave_writes(&self, writes: u32) {
        self.state.lock().unwrap().interleaved_writes = writes;
    }
}

#[async_trait]
impl DeploymentsClient for InMemoryCluster {
    async fn get(&self, name: &DeploymentName) -> Result<Deployment, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Get(name.0.clone()));
        if let Some(err) = state.get_failure.clone() {
            if state.gets_before_failure == 0 {
                return Err(err);
            }
            state.gets_before_failure -= 1;
        }
        state.objects.get(name.as_str()).cloned().ok_or_else(|| {
            ClientError::NotFound(format!("deployments.apps \"{name}\" not found"))
        })
    }

    async fn create(&self, deployment: &Deployment) -> Result<Deployment, ClientError> {
        let name = name_of(deployment);
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(name.clone()));
        if let Some(err) = state.create_failure.clone() {
            return Err(err);
        }
        if state.objects.contains_key(&name) {
            return Err(ClientError::Api {
                code: 409,
                message: format!("deployments.apps \"{name}\" already exists"),
            });
        }
        let mut created = deployment.clone();
        created.metadata.resource_version = Some(state.bump_version());
        state.objects.insert(name, created.clone());
        Ok(created)
    }

    async fn replace(
        &self,
        name: &DeploymentName,
        deployment: &Deployment,
    ) -> Result<Deployment, ClientError> {
        let name = name.0.clone();
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Replace(name.clone()));

        if state.interleaved_writes > 0 {
            state.interleaved_writes -= 1;
            let version = state.bump_version();
            if let Some(stored) = state.objects.get_mut(&name) {
                stored
                    .metadata
                    .finalizers
                    .get_or_insert_with(Vec::new)
                    .push(format!("{INTERLEAVED_FINALIZER}-{version}"));
                stored.metadata.resource_version = Some(version);
            }
        }

        let stored_version = match state.objects.get(&name) {
            Some(stored) => stored.metadata.resource_version.clone(),
            None => {
                return Err(ClientError::NotFound(format!(
                    "deployments.apps \"{name}\" not found"
                )))
            }
        };
        if deployment.metadata.resource_version != stored_version {
            return Err(ClientError::Conflict(format!(
                "Operation cannot be fulfilled on deployments.apps \"{name}\": \
                 the object has been modified; please apply your changes to the latest version and try again"
            )));
        }

        let mut replaced = deployment.clone();
        replaced.metadata.resource_version = Some(state.bump_version());
        state.objects.insert(name, replaced.clone());
        Ok(replaced)
    }

    async fn delete(
        &self,
        name: &DeploymentName,
        propagation: Propagation,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(name.0.clone(), propagation));
        if let Some(err) = state.delete_failure.clone() {
            return Err(err);
        }
        state
            .objects
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("deployments.apps \"{name}\" not found")))
    }
}
