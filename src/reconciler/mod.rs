pub mod retry;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use tracing::{error, info, info_span, Instrument, Span};

use crate::kubernetes::model::{ClientError, DeploymentName, DeploymentsClient, Propagation};
use crate::reconciler::retry::{retry_on_conflict, Backoff};

// Thread safe type alias
pub type ReconcilerClient = Arc<dyn DeploymentsClient + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Get,
    Create,
    Update,
    Delete,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Get => "get",
            Stage::Create => "create",
            Stage::Update => "update",
            Stage::Delete => "delete",
        })
    }
}

/// Result of a single reconcile call. Its `Display` form is the status line
/// handed back to callers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Created(DeploymentName),
    Updated(DeploymentName),
    Deleted(DeploymentName),
    Absent(DeploymentName),
    Failed { stage: Stage, reason: String },
}

impl Outcome {
    fn failed(stage: Stage, err: ClientError) -> Outcome {
        Outcome::Failed {
            stage,
            reason: err.to_string(),
        }
    }

    fn unnamed() -> Outcome {
        Outcome::Failed {
            stage: Stage::Get,
            reason: String::from("deployment has no name"),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed { .. })
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Created(name) => write!(f, "create deployment \"{name}\""),
            Outcome::Updated(name) => write!(f, "update deployment \"{name}\""),
            Outcome::Deleted(name) => write!(f, "delete deployment \"{name}\""),
            Outcome::Absent(name) => write!(f, "deployment does not exist: {name}"),
            Outcome::Failed { stage, reason } => write!(f, "{stage} deployment err: {reason}"),
        }
    }
}

/// Applies and deletes single Deployments.
/// Stateless between calls: the client and the logging span are injected and
/// every call starts from a fresh lookup.
pub struct DeploymentReconciler {
    client: ReconcilerClient,
    backoff: Backoff,
    span: Span,
}

impl DeploymentReconciler {
    pub fn new(client: ReconcilerClient, backoff: Backoff, span: Span) -> DeploymentReconciler {
        DeploymentReconciler {
            client,
            backoff,
            span,
        }
    }

    /// Creates the Deployment, or updates labels, annotations and spec of the existing one.
    pub async fn apply(&self, desired: &Deployment) -> Outcome {
        let span = self.call_span("apply", desired);
        let outcome = self.reconcile_apply(desired).instrument(span.clone()).await;
        span.in_scope(|| report(&outcome));
        outcome
    }

    /// Deletes the Deployment with foreground propagation. A missing object is not an error.
    pub async fn delete(&self, desired: &Deployment) -> Outcome {
        let span = self.call_span("delete", desired);
        let outcome = self.reconcile_delete(desired).instrument(span.clone()).await;
        span.in_scope(|| report(&outcome));
        outcome
    }

    fn call_span(&self, operation: &'static str, desired: &Deployment) -> Span {
        let name = desired.metadata.name.as_deref().unwrap_or_default();
        info_span!(parent: &self.span, "reconcile", operation, deployment = name)
    }

    async fn reconcile_apply(&self, desired: &Deployment) -> Outcome {
        let name = match DeploymentName::of(desired) {
            Some(name) => name,
            None => return Outcome::unnamed(),
        };

        match self.client.get(&name).await {
            Ok(current) => self.update(&name, current, desired).await,
            Err(err) if err.is_not_found() => match self.client.create(desired).await {
                Ok(created) => Outcome::Created(DeploymentName::of(&created).unwrap_or(name)),
                Err(err) => Outcome::failed(Stage::Create, err),
            },
            Err(err) => Outcome::failed(Stage::Get, err),
        }
    }

    async fn update(
        &self,
        name: &DeploymentName,
        current: Deployment,
        desired: &Deployment,
    ) -> Outcome {
        let client = self.client.as_ref();
        let mut fetched = Some(current);

        // The first attempt reuses the lookup; conflicted attempts start from a fresh read.
        let result = retry_on_conflict(&self.backoff, |_| {
            let base = fetched.take();
            async move {
                let mut target = match base {
                    Some(current) => current,
                    None => client.get(name).await?,
                };
                merge_onto(&mut target, desired);
                client.replace(name, &target).await
            }
        })
        .await;

        match result {
            Ok(_) => Outcome::Updated(name.clone()),
            Err(err) => Outcome::failed(Stage::Update, err),
        }
    }

    async fn reconcile_delete(&self, desired: &Deployment) -> Outcome {
        let name = match DeploymentName::of(desired) {
            Some(name) => name,
            None => return Outcome::unnamed(),
        };

        match self.client.get(&name).await {
            Ok(_) => match self.client.delete(&name, Propagation::Foreground).await {
                Ok(()) => Outcome::Deleted(name),
                Err(err) => Outcome::failed(Stage::Delete, err),
            },
            Err(err) if err.is_not_found() => Outcome::Absent(name),
            Err(err) => Outcome::failed(Stage::Get, err),
        }
    }
}

fn merge_onto(current: &mut Deployment, desired: &Deployment) {
    current.metadata.labels = desired.metadata.labels.clone();
    current.metadata.annotations = desired.metadata.annotations.clone();
    current.spec = desired.spec.clone();
}

fn report(outcome: &Outcome) {
    if outcome.is_success() {
        info!("{outcome}");
    } else {
        error!("{outcome}");
    }
}
