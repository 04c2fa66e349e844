//! Read-only controller.
//!
//! One bounded convergence pass: inspect every task exactly once, waiting
//! out incomplete first populations, then return. Unlike the read-write
//! loop this terminates, and any failure is a hard `run` error.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, trace};

use crate::tmpl::{Resolver, Watcher};

use super::base::BaseController;
use super::unit::Unit;
use super::ControllerError;

/// Controller that plans every task once without touching infrastructure
pub struct ReadOnlyController {
    units: Vec<Unit>,
    watcher: Arc<dyn Watcher>,
    resolver: Arc<dyn Resolver>,
}

impl ReadOnlyController {
    /// Take over an initialized base controller.
    ///
    /// Units are sorted by task name for deterministic inspection output.
    pub fn new(mut base: BaseController) -> Self {
        base.units.sort_by(|a, b| a.task_name().cmp(b.task_name()));
        Self {
            units: base.units,
            watcher: base.watcher,
            resolver: base.resolver,
        }
    }

    /// Inspect all tasks once.
    ///
    /// Returns `Ok(())` in the same outer iteration the last unit completes.
    /// Cancellation at a block point returns [`ControllerError::Cancelled`]
    /// immediately, unwrapped.
    #[instrument(skip_all)]
    pub async fn run(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ControllerError> {
        info!("inspecting all tasks");

        // Subscribe before the first scan so no change can slip past.
        let mut changes = self.watcher.subscribe();
        let resolver = Arc::clone(&self.resolver);
        let mut inspected: HashSet<String> = HashSet::with_capacity(self.units.len());

        loop {
            let mut done = true;
            for unit in self.units.iter_mut() {
                if inspected.contains(unit.task_name()) {
                    continue;
                }
                if check_inspect(resolver.as_ref(), unit).await? {
                    inspected.insert(unit.task_name().to_string());
                } else {
                    done = false;
                }
            }

            if done {
                info!("completed task inspections");
                return Ok(());
            }

            debug!(
                pending = self.units.len() - inspected.len(),
                "waiting for remaining dependencies"
            );
            tokio::select! {
                _ = shutdown.changed() => return Err(ControllerError::Cancelled),
                res = changes.wait() => res.map_err(ControllerError::Watch)?,
            }
        }
    }
}

/// One resolve step for a unit; inspects when the template is complete.
///
/// Returns whether the unit finished its inspection this iteration.
async fn check_inspect(resolver: &dyn Resolver, unit: &mut Unit) -> Result<bool, ControllerError> {
    let task_name = unit.task_name().to_string();
    trace!(task = %task_name, "checking dependency changes");

    let result = resolver
        .resolve(unit.template.as_ref())
        .await
        .map_err(|e| ControllerError::Resolve {
            task: task_name.clone(),
            source: e,
        })?;

    // Complete is only true once the template's data has been fully
    // fetched; first population may take several watch cycles.
    if !result.complete {
        return Ok(false);
    }

    unit.template
        .render(&result.contents)
        .await
        .map_err(|e| ControllerError::Render {
            task: task_name.clone(),
            source: e,
        })?;

    info!(task = %task_name, "inspecting task");
    unit.driver
        .inspect_task()
        .await
        .map_err(|e| ControllerError::Inspect {
            task: task_name.clone(),
            source: e,
        })?;

    info!(task = %task_name, "inspected task");
    Ok(true)
}
