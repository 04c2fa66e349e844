//! Unit: runtime binding of a task to a template and driver.

use crate::domain::Task;
use crate::driver::Driver;
use crate::tmpl::Template;

/// One runnable unit of automation.
///
/// Created once at controller init; the bindings never mutate afterwards.
/// The driver is exclusively owned and never shared between units, which
/// removes any need for cross-task locking at the driver layer.
pub struct Unit {
    pub(crate) task: Task,
    pub(crate) template: Box<dyn Template>,
    pub(crate) driver: Box<dyn Driver>,
}

impl Unit {
    pub fn new(task: Task, template: Box<dyn Template>, driver: Box<dyn Driver>) -> Self {
        Self {
            task,
            template,
            driver,
        }
    }

    /// The bound task's unique name
    pub fn task_name(&self) -> &str {
        &self.task.name
    }

    /// The bound task configuration
    pub fn task(&self) -> &Task {
        &self.task
    }
}
