//! Kubernetes resource watcher.
//!
//! Drives reconciliation through `kube_runtime::Controller`. Events on a
//! Teamspeak and on the Pods and Services it owns all trigger a
//! reconciliation of that Teamspeak; failures are requeued with a
//! per-object Fibonacci backoff.

use crate::backoff::FibonacciBackoff;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::Teamspeak;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{Api, ResourceExt};
use kube_runtime::{
    Controller, watcher,
    controller::{Action, Config as ControllerConfig},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requeue delays for failing objects.
///
/// Each object gets its own backoff sequence. A successful reconciliation
/// resets it and a deleted object drops it.
#[derive(Debug)]
pub struct RetryPolicy {
    min_minutes: u64,
    max_minutes: u64,
    backoffs: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl RetryPolicy {
    /// Creates a policy whose sequences run from `min_minutes` up to `max_minutes`.
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            backoffs: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure of `key` and returns how long to wait before retrying.
    pub fn failed(&self, key: &str) -> Duration {
        let mut backoffs = self.backoffs.lock().unwrap_or_else(PoisonError::into_inner);
        backoffs
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(self.min_minutes, self.max_minutes))
            .next_backoff()
    }

    /// Restarts the backoff sequence of `key`.
    pub fn succeeded(&self, key: &str) {
        if let Some(backoff) = self.backoffs.lock().unwrap_or_else(PoisonError::into_inner).get_mut(key) {
            backoff.reset();
        }
    }

    /// Drops all state of `key`, once its object is gone.
    pub fn forget(&self, key: &str) {
        self.backoffs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of objects with backoff state.
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.backoffs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// State shared by the reconcile and error-policy callbacks.
pub struct WatchContext {
    reconciler: Arc<Reconciler>,
    retries: RetryPolicy,
}

impl std::fmt::Debug for WatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchContext")
            .field("reconciler", &self.reconciler)
            .field("retries", &self.retries)
            .finish()
    }
}

impl WatchContext {
    /// Bundles the reconciler with the retry state of the watched objects.
    pub fn new(reconciler: Arc<Reconciler>, retries: RetryPolicy) -> Self {
        Self { reconciler, retries }
    }
}

fn object_key(teamspeak: &Teamspeak) -> String {
    format!(
        "{}/{}",
        teamspeak.namespace().unwrap_or_default(),
        teamspeak.name_any()
    )
}

async fn reconcile(teamspeak: Arc<Teamspeak>, ctx: Arc<WatchContext>) -> Result<Action, ControllerError> {
    let key = object_key(&teamspeak);
    let namespace = teamspeak
        .namespace()
        .ok_or_else(|| ControllerError::InvalidResource(format!("Teamspeak {} has no namespace", key)))?;
    let name = teamspeak.name_any();

    let outcome = ctx.reconciler.reconcile_teamspeak(&namespace, &name).await?;

    match outcome {
        ReconcileOutcome::Deleted => {
            ctx.retries.forget(&key);
            debug!("Teamspeak {} gone, nothing to reconcile", key);
        }
        ReconcileOutcome::Converged { address, pod_created, service_created } => {
            ctx.retries.succeeded(&key);
            if pod_created || service_created {
                info!(
                    "Teamspeak {} converged on {} (pod created: {}, service created: {})",
                    key, address, pod_created, service_created
                );
            }
        }
    }

    // Owned Pod and Service events bring us back here
    Ok(Action::await_change())
}

fn error_policy(teamspeak: Arc<Teamspeak>, error: &ControllerError, ctx: Arc<WatchContext>) -> Action {
    let key = object_key(&teamspeak);
    let delay = ctx.retries.failed(&key);

    if error.is_retryable_admission() {
        warn!("Teamspeak {} waiting for a free address, retrying in {:?}: {}", key, delay, error);
    } else {
        error!(
            "Reconciliation of Teamspeak {} failed ({}), retrying in {:?}: {}",
            key,
            error.kind(),
            delay,
            error
        );
    }

    Action::requeue(delay)
}

/// Watches Teamspeak resources and their children.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    teamspeak_api: Api<Teamspeak>,
    pod_api: Api<Pod>,
    service_api: Api<Service>,
    config: ControllerConfig,
    retries: RetryPolicy,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("reconciler", &self.reconciler)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    ///
    /// `ready` is raised once the controller is running and lowered when it stops.
    pub fn new(
        reconciler: Arc<Reconciler>,
        teamspeak_api: Api<Teamspeak>,
        pod_api: Api<Pod>,
        service_api: Api<Service>,
        config: &OperatorConfig,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reconciler,
            teamspeak_api,
            pod_api,
            service_api,
            config: ControllerConfig::default()
                .debounce(config.debounce)
                .concurrency(config.concurrency),
            retries: RetryPolicy::new(config.backoff_min_minutes, config.backoff_max_minutes),
            ready,
        }
    }

    /// Runs the controller until it is shut down.
    pub async fn watch_teamspeaks(self) -> Result<(), ControllerError> {
        info!("Starting Teamspeak watcher");

        let ctx = Arc::new(WatchContext::new(self.reconciler, self.retries));
        let ready = self.ready.clone();

        let controller = Controller::new(self.teamspeak_api, watcher::Config::default())
            .owns(self.pod_api, watcher::Config::default())
            .owns(self.service_api, watcher::Config::default())
            .with_config(self.config)
            .shutdown_on_signal();

        self.ready.store(true, Ordering::SeqCst);

        controller
            .run(reconcile, error_policy, ctx)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled Teamspeak {}", obj),
                    Err(e) => error!("Teamspeak controller error: {}", e),
                }
            })
            .await;

        ready.store(false, Ordering::SeqCst);
        info!("Teamspeak watcher stopped");
        Ok(())
    }
}
