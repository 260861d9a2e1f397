//! Per-host fan-out of a phase.
//!
//! Every host runs as its own task. The phase completes when every task has
//! reported, so a slow or failing host never hides a sibling's outcome.

use fleet_core::{HostOutcome, HostStatus, Phase, PhaseReport};
use fleet_remote::RemoteSession;
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run `task` once per `(host, session)` in parallel and collect one outcome each.
///
/// A task that panics or outlives `deadline` is recorded as failed. Outcomes
/// keep the input order.
pub async fn run_phase<F, Fut>(
    phase: Phase,
    targets: Vec<(String, Arc<dyn RemoteSession>)>,
    deadline: Option<Duration>,
    task: F,
) -> PhaseReport
where
    F: Fn(String, Arc<dyn RemoteSession>) -> Fut,
    Fut: Future<Output = HostOutcome> + Send + 'static,
{
    info!(%phase, hosts = targets.len(), "Phase starting");

    let mut hosts = Vec::with_capacity(targets.len());
    let mut handles = Vec::with_capacity(targets.len());
    for (host, session) in targets {
        let work = task(host.clone(), session);
        hosts.push(host);
        handles.push(tokio::spawn(async move {
            match deadline {
                Some(limit) => tokio::time::timeout(limit, work).await.ok(),
                None => Some(work.await),
            }
        }));
    }

    let mut report = PhaseReport::new(phase);
    for (host, joined) in hosts.into_iter().zip(join_all(handles).await) {
        let outcome = match joined {
            Ok(Some(outcome)) => outcome,
            Ok(None) => HostOutcome::failed(host, "phase deadline expired"),
            Err(e) if e.is_panic() => HostOutcome::failed(host, "task panicked"),
            Err(e) => HostOutcome::failed(host, format!("task aborted: {}", e)),
        };
        if let Some(reason) = failure_reason(&outcome) {
            warn!(%phase, host = %outcome.host, reason, "Host failed");
        }
        report.record(outcome);
    }

    info!(
        %phase,
        succeeded = report.succeeded().len(),
        failed = report.failed().len(),
        "Phase complete"
    );
    report
}

fn failure_reason(outcome: &HostOutcome) -> Option<&str> {
    match &outcome.status {
        HostStatus::Failed { reason } => Some(reason),
        HostStatus::Succeeded { .. } => None,
    }
}
