use common::Cluster;
use kube::{
    Resource,
    runtime::events::{Event, EventType, Recorder},
};

#[must_use] pub fn space_created(cluster: &str, space: &str) -> Event {
    Event {
        type_: EventType::Normal,
        reason: "ExecutionSpaceCreated".to_string(),
        note: Some(format!("Created execution space `{space}` for cluster `{cluster}`")),
        action: format!("Creating `{space}` namespace"),
        secondary: None,
    }
}

#[must_use] pub fn space_deleting(cluster: &str, space: &str) -> Event {
    Event {
        type_: EventType::Normal,
        reason: "ExecutionSpaceDeleting".to_string(),
        note: Some(format!("Deleting execution space `{space}` of cluster `{cluster}`")),
        action: format!("Deleting `{space}` namespace"),
        secondary: None,
    }
}

#[must_use] pub fn finalizer_released(cluster: &str, space: &str) -> Event {
    Event {
        type_: EventType::Normal,
        reason: "ClusterFinalized".to_string(),
        note: Some(format!("Execution space `{space}` is gone, releasing cluster `{cluster}`")),
        action: "Removing finalizer".to_string(),
        secondary: None,
    }
}

#[must_use] pub fn invalid_name(cluster: &str, reason: &str) -> Event {
    Event {
        type_: EventType::Warning,
        reason: "InvalidClusterName".to_string(),
        note: Some(reason.to_string()),
        action: format!("Naming execution space of `{cluster}`"),
        secondary: None,
    }
}

/// Publish an event on the cluster. Failures are only logged.
pub async fn publish(recorder: Option<&Recorder>, cluster: &Cluster, event: Event) {
    let Some(recorder) = recorder else {
        return;
    };
    if let Err(e) = recorder.publish(&event, &cluster.object_ref(&())).await {
        tracing::warn!("Publishing event {} failed with: {e}", event.reason);
    }
}
