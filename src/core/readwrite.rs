//! Read-write controller.
//!
//! One unbounded convergence loop per unit, each running as its own tokio
//! task. Loops share only the event store and a single aggregated outcome
//! channel; a unit's repeated failures never block or stop its siblings.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, trace, warn};

use crate::domain::Event;
use crate::tmpl::{Resolver, WatchSubscription, Watcher};

use super::base::BaseController;
use super::store::EventStore;
use super::unit::Unit;
use super::ControllerError;

/// Outcome of one unit cycle, multiplexed onto the shared channel
pub type CycleOutcome = Result<(), ControllerError>;

/// What a single cycle did, before waiting
enum Cycle {
    /// Dependencies still pending; nothing rendered, nothing recorded
    Incomplete,

    /// Template rendered and the converge ran to completion
    Converged,
}

/// Controller that keeps infrastructure converged until cancelled
pub struct ReadWriteController {
    units: Vec<Unit>,
    watcher: Arc<dyn Watcher>,
    resolver: Arc<dyn Resolver>,
    store: Arc<EventStore>,
}

impl ReadWriteController {
    /// Take over an initialized base controller
    pub fn new(base: BaseController) -> Self {
        Self {
            units: base.units,
            watcher: base.watcher,
            resolver: base.resolver,
            store: base.store,
        }
    }

    /// The shared event store, for status read models
    pub fn store(&self) -> Arc<EventStore> {
        Arc::clone(&self.store)
    }

    /// Fan out one loop per unit.
    ///
    /// Returns the receiver the caller drains: one `Ok(())` or wrapped
    /// error per completed cycle, and one [`ControllerError::Cancelled`]
    /// per unit on shutdown. The channel closes once every loop has exited.
    #[instrument(skip_all)]
    pub fn run(self, shutdown: watch::Receiver<bool>) -> mpsc::Receiver<CycleOutcome> {
        info!(units = self.units.len(), "starting convergence loops");

        let (tx, rx) = mpsc::channel(64);
        for unit in self.units {
            // Subscribe before the first cycle so no change can slip past.
            let changes = self.watcher.subscribe();
            let resolver = Arc::clone(&self.resolver);
            let store = Arc::clone(&self.store);
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(unit_loop(unit, changes, resolver, store, tx, shutdown));
        }

        rx
    }
}

/// The per-unit convergence loop: resolve, render, converge, wait.
///
/// Within one unit this sequence is strictly sequential, so a unit never
/// overlaps its own converge; across units there is no ordering at all.
async fn unit_loop(
    mut unit: Unit,
    mut changes: WatchSubscription,
    resolver: Arc<dyn Resolver>,
    store: Arc<EventStore>,
    tx: mpsc::Sender<CycleOutcome>,
    mut shutdown: watch::Receiver<bool>,
) {
    let task_name = unit.task_name().to_string();
    debug!(task = %task_name, "unit loop started");

    loop {
        match run_cycle(resolver.as_ref(), &store, &mut unit).await {
            Ok(Cycle::Converged) => {
                if tx.send(Ok(())).await.is_err() {
                    return;
                }
            }
            Ok(Cycle::Incomplete) => {
                trace!(task = %task_name, "dependencies not yet complete");
            }
            Err(e) => {
                warn!(task = %task_name, error = %e, "cycle failed");
                if tx.send(Err(e)).await.is_err() {
                    return;
                }
            }
        }

        trace!(task = %task_name, "waiting for registry change");
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(task = %task_name, "unit loop cancelled");
                let _ = tx.send(Err(ControllerError::Cancelled)).await;
                return;
            }
            res = changes.wait() => {
                if let Err(e) = res {
                    if tx.send(Err(ControllerError::Watch(e))).await.is_err() {
                        return;
                    }
                    // Back off before retrying a broken watch engine;
                    // shutdown interrupts the pause.
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!(task = %task_name, "unit loop cancelled");
                            let _ = tx.send(Err(ControllerError::Cancelled)).await;
                            return;
                        }
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                    }
                }
            }
        }
    }
}

/// One resolve-render-converge cycle for a unit.
///
/// Exactly one event is recorded per completed converge attempt; none for
/// incomplete resolutions or for failures before the converge started.
async fn run_cycle(
    resolver: &dyn Resolver,
    store: &EventStore,
    unit: &mut Unit,
) -> Result<Cycle, ControllerError> {
    let task_name = unit.task_name().to_string();
    trace!(task = %task_name, "checking dependency changes");

    let result = resolver
        .resolve(unit.template.as_ref())
        .await
        .map_err(|e| ControllerError::Resolve {
            task: task_name.clone(),
            source: e,
        })?;

    if !result.complete {
        return Ok(Cycle::Incomplete);
    }

    debug!(task = %task_name, "change detected");
    unit.template
        .render(&result.contents)
        .await
        .map_err(|e| ControllerError::Render {
            task: task_name.clone(),
            source: e,
        })?;

    info!(task = %task_name, "applying task");
    let event = Event::begin(&task_name, Some(unit.task().snapshot()));

    let converge = async {
        unit.driver.init_work().await?;
        unit.driver.apply_work().await
    }
    .await
    .map_err(|e| ControllerError::Apply {
        task: task_name.clone(),
        source: e,
    });

    store.add(event.finish(&converge));
    converge?;

    info!(task = %task_name, "applied task");
    Ok(Cycle::Converged)
}
