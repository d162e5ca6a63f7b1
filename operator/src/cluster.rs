//! Cluster membership controller
//!
//! Every pass re-reads the cluster record and its execution space, derives an
//! [`Observation`] and lets the pure [`decide`] function pick the next
//! [`Transition`]. The finalizer is only claimed once the execution space exists,
//! and only released once the space is confirmed gone.
use crate::{
    CLUSTER_FINALIZER, Error, Result, events, manager::Context, store::StoreError, telemetry,
};
use chrono::Utc;
use common::{Cluster, finalizer, names};
use kube::{ResourceExt, runtime::controller::Action};
use opentelemetry::trace::TraceId;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{Span, field, instrument};

/// What the execution space looked like on this pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceState {
    Present,
    Absent,
    /// Not read yet on this pass
    Unobserved,
}

/// Live state of a cluster as read from both stores
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub terminating: bool,
    pub finalizer: bool,
    pub space: SpaceState,
}

impl Observation {
    pub fn of(cluster: &Cluster, space: SpaceState) -> Self {
        Self {
            terminating: cluster.is_terminating(),
            finalizer: finalizer::has(cluster, CLUSTER_FINALIZER),
            space,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Read the execution space before deciding
    Observe,
    /// Create the execution space, then claim the finalizer
    Provision,
    /// The space exists already, only claim the finalizer
    Claim,
    /// The finalizer is held but the space vanished, create it again
    Restore,
    /// Nothing to do
    Settled,
    /// Request the deletion of the execution space
    Evict,
    /// The space is still terminating, check again later
    AwaitDeletion,
    /// The space is confirmed gone, release the finalizer
    Release,
    /// Our finalizer is already gone
    Finalized,
}

/// Pick the next step for an observed cluster
pub fn decide(obs: &Observation) -> Transition {
    use SpaceState::*;
    match (obs.terminating, obs.finalizer, obs.space) {
        (false, _, Unobserved) => Transition::Observe,
        (false, false, Absent) => Transition::Provision,
        (false, false, Present) => Transition::Claim,
        (false, true, Absent) => Transition::Restore,
        (false, true, Present) => Transition::Settled,
        (true, false, _) => Transition::Finalized,
        (true, true, Unobserved) => Transition::Evict,
        (true, true, Present) => Transition::AwaitDeletion,
        (true, true, Absent) => Transition::Release,
    }
}

async fn space_name(cluster: &Cluster, ctx: &Context) -> Result<String> {
    let name = cluster.name_any();
    match names::execution_space_name(&name) {
        Ok(space) => Ok(space),
        Err(e) => {
            tracing::error!("Failed to generate execution space name for cluster {name}: {e}");
            events::publish(
                ctx.recorder.as_ref(),
                cluster,
                events::invalid_name(&name, &e.to_string()),
            )
            .await;
            Err(Error::NamingError(e))
        }
    }
}

async fn probe_space(ctx: &Context, space: &str) -> Result<SpaceState> {
    match ctx.spaces.get(space).await {
        Ok(_) => Ok(SpaceState::Present),
        Err(e) if e.is_not_found() => Ok(SpaceState::Absent),
        Err(e) => {
            tracing::error!("Could not get execution space {space}: {e}");
            Err(e.into())
        }
    }
}

async fn create_space(cluster: &Cluster, space: &str, ctx: &Context) -> Result<()> {
    let labels = BTreeMap::from([(
        names::EXECUTION_SPACE_LABEL_KEY.to_string(),
        names::EXECUTION_SPACE_LABEL_VALUE.to_string(),
    )]);
    match ctx.spaces.create(space, labels).await {
        Ok(_) => {
            tracing::info!("Created execution space {space} for cluster {}", cluster.name_any());
            ctx.metrics.spaces.created.inc();
            events::publish(
                ctx.recorder.as_ref(),
                cluster,
                events::space_created(&cluster.name_any(), space),
            )
            .await;
            Ok(())
        }
        Err(StoreError::AlreadyExists(_)) => {
            tracing::debug!("Execution space {space} was created concurrently");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to create execution space for cluster {}: {e}", cluster.name_any());
            Err(e.into())
        }
    }
}

/// Delete the space and report whether it is still observable
async fn evict_space(cluster: &Cluster, space: &str, ctx: &Context) -> Result<SpaceState> {
    match ctx.spaces.delete(space).await {
        Ok(()) => {
            ctx.metrics.spaces.deleted.inc();
            events::publish(
                ctx.recorder.as_ref(),
                cluster,
                events::space_deleting(&cluster.name_any(), space),
            )
            .await;
            probe_space(ctx, space).await
        }
        Err(e) if e.is_not_found() => Ok(SpaceState::Absent),
        Err(e) => {
            tracing::error!("Error while deleting execution space {space}: {e}");
            Err(e.into())
        }
    }
}

async fn claim(cluster: &mut Cluster, ctx: &Context) -> Result<()> {
    if finalizer::add(cluster, CLUSTER_FINALIZER) {
        *cluster = ctx.clusters.update(cluster).await?;
    }
    Ok(())
}

async fn release(cluster: &mut Cluster, ctx: &Context) -> Result<()> {
    if finalizer::remove(cluster, CLUSTER_FINALIZER) {
        *cluster = ctx.clusters.update(cluster).await?;
    }
    Ok(())
}

/// Ensure an active cluster has its execution space and holds our finalizer
pub async fn sync(mut cluster: Cluster, ctx: &Context) -> Result<Action> {
    let space = space_name(&cluster, ctx).await?;
    let state = probe_space(ctx, &space).await?;
    match decide(&Observation::of(&cluster, state)) {
        Transition::Provision => {
            create_space(&cluster, &space, ctx).await?;
            claim(&mut cluster, ctx).await?;
        }
        Transition::Claim => claim(&mut cluster, ctx).await?,
        Transition::Restore => {
            tracing::warn!("Execution space {space} disappeared, creating it again");
            create_space(&cluster, &space, ctx).await?;
        }
        Transition::Settled => {}
        other => {
            return Err(Error::UnexpectedTransition(format!(
                "{other:?} while syncing cluster {}",
                cluster.name_any()
            )));
        }
    }
    ctx.registry.register(&cluster).await;
    Ok(Action::await_change())
}

/// Remove the execution space of a terminating cluster, then release it
pub async fn teardown(mut cluster: Cluster, ctx: &Context) -> Result<Action> {
    let name = cluster.name_any();
    ctx.registry.unregister(&name).await;
    if decide(&Observation::of(&cluster, SpaceState::Unobserved)) == Transition::Finalized {
        return Ok(Action::await_change());
    }
    let space = space_name(&cluster, ctx).await?;
    let state = evict_space(&cluster, &space, ctx).await?;
    match decide(&Observation::of(&cluster, state)) {
        Transition::AwaitDeletion => {
            tracing::info!("Execution space {space} of cluster {name} is still terminating");
            ctx.metrics.spaces.pending_deletion.inc();
            Ok(Action::requeue(ctx.config.deletion_poll))
        }
        Transition::Release => {
            release(&mut cluster, ctx).await?;
            events::publish(
                ctx.recorder.as_ref(),
                &cluster,
                events::finalizer_released(&name, &space),
            )
            .await;
            Ok(Action::await_change())
        }
        other => Err(Error::UnexpectedTransition(format!(
            "{other:?} while tearing down cluster {name}"
        ))),
    }
}

/// Load the current record and drive it one step toward its desired state
pub async fn reconcile_cluster(name: &str, ctx: &Context) -> Result<Action> {
    let cluster = match ctx.clusters.get(name).await {
        Ok(c) => c,
        Err(e) if e.is_not_found() => {
            tracing::debug!("Cluster {name} is gone");
            ctx.registry.unregister(name).await;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };
    if cluster.is_terminating() {
        teardown(cluster, ctx).await
    } else {
        sync(cluster, ctx).await
    }
}

#[instrument(skip(ctx, cluster), fields(trace_id))]
pub async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _mes = ctx.metrics.cluster.count_and_measure(&trace_id);
    ctx.diagnostics.write().await.last_event = Utc::now();
    let name = cluster
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::MissingName(format!("{:?}", cluster.metadata.uid)))?;
    tracing::debug!("Reconciling cluster {name}");
    let action = reconcile_cluster(&name, &ctx).await?;
    ctx.backoff.reset(&name);
    Ok(action)
}

#[must_use]
pub fn error_policy(cluster: Arc<Cluster>, error: &Error, ctx: Arc<Context>) -> Action {
    ctx.metrics.cluster.reconcile_failure(&cluster, error);
    if !error.is_retryable() {
        tracing::error!(
            "reconcile failed for Cluster {:?} and will not be retried until it changes: {:?}",
            cluster.metadata.name,
            error
        );
        return Action::await_change();
    }
    let delay = ctx.backoff.next_delay(&cluster.name_any());
    tracing::warn!(
        "reconcile failed for Cluster {:?}, retrying in {delay:?}: {:?}",
        cluster.metadata.name,
        error
    );
    Action::requeue(delay)
}
