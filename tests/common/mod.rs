//! Shared mock collaborators for controller integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use driftsync::core::base::{DriverFactory, FileSource};
use driftsync::core::{BaseController, EventStore};
use driftsync::driver::{Driver, DriverError, GeneratedFile};
use driftsync::tmpl::{RenderEvent, ResolveError, Resolver, Template, WatchSubscription, Watcher};
use driftsync::Task;

pub fn task(name: &str) -> Task {
    Task {
        name: name.to_string(),
        description: format!("automate services for {}", name),
        source: "./modules/test".to_string(),
        version: Some("v1".to_string()),
        services: vec!["api".to_string(), "web".to_string()],
        providers: vec!["local".to_string()],
    }
}

/// Records driver calls as "task:method" strings, shared with the test
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, task: &str, call: &str) {
        self.0.lock().unwrap().push(format!("{}:{}", task, call));
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == needle)
            .count()
    }
}

fn scripted_err(task: &str, message: &Option<String>) -> Result<(), DriverError> {
    match message {
        Some(m) => Err(DriverError::Workspace {
            task: task.to_string(),
            message: m.clone(),
        }),
        None => Ok(()),
    }
}

/// Driver double with scriptable per-method outcomes
#[derive(Default)]
pub struct ScriptedDriver {
    pub task_name: String,
    pub log: CallLog,
    pub init_err: Option<String>,
    pub init_task_err: Option<String>,
    pub init_worker_err: Option<String>,
    pub inspect_err: Option<String>,
    pub init_work_err: Option<String>,
    /// Consumed per apply call; empty queue means success
    pub apply_results: VecDeque<Result<(), String>>,
    /// Overrides the queue: every apply fails with this message
    pub apply_always_err: Option<String>,
}

impl ScriptedDriver {
    pub fn ok(task_name: &str, log: CallLog) -> Self {
        Self {
            task_name: task_name.to_string(),
            log,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn init(&mut self) -> Result<(), DriverError> {
        self.log.record(&self.task_name, "init");
        scripted_err(&self.task_name, &self.init_err)
    }

    async fn init_task(&mut self, force_overwrite: bool) -> Result<(), DriverError> {
        self.log
            .record(&self.task_name, &format!("init_task({})", force_overwrite));
        scripted_err(&self.task_name, &self.init_task_err)
    }

    async fn init_worker(&mut self) -> Result<(), DriverError> {
        self.log.record(&self.task_name, "init_worker");
        scripted_err(&self.task_name, &self.init_worker_err)
    }

    async fn inspect_task(&mut self) -> Result<(), DriverError> {
        self.log.record(&self.task_name, "inspect_task");
        scripted_err(&self.task_name, &self.inspect_err)
    }

    async fn init_work(&mut self) -> Result<(), DriverError> {
        self.log.record(&self.task_name, "init_work");
        scripted_err(&self.task_name, &self.init_work_err)
    }

    async fn apply_work(&mut self) -> Result<(), DriverError> {
        self.log.record(&self.task_name, "apply_work");
        if let Some(m) = &self.apply_always_err {
            return Err(DriverError::Workspace {
                task: self.task_name.clone(),
                message: m.clone(),
            });
        }
        match self.apply_results.pop_front() {
            Some(Err(m)) => Err(DriverError::Workspace {
                task: self.task_name.clone(),
                message: m,
            }),
            _ => Ok(()),
        }
    }
}

/// Resolver double with a per-template completion schedule.
///
/// Each resolve pops the next scheduled `complete` flag for the template;
/// an exhausted (or missing) schedule falls back to `default_complete`.
pub struct ScriptedResolver {
    schedules: Mutex<HashMap<String, VecDeque<bool>>>,
    default_complete: bool,
}

impl ScriptedResolver {
    pub fn always(complete: bool) -> Self {
        Self {
            schedules: Mutex::new(HashMap::new()),
            default_complete: complete,
        }
    }

    pub fn with_schedule(
        schedules: impl IntoIterator<Item = (&'static str, Vec<bool>)>,
        default_complete: bool,
    ) -> Self {
        let schedules = schedules
            .into_iter()
            .map(|(name, seq)| (name.to_string(), seq.into_iter().collect()))
            .collect();
        Self {
            schedules: Mutex::new(schedules),
            default_complete,
        }
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, template: &dyn Template) -> Result<RenderEvent, ResolveError> {
        let complete = {
            let mut schedules = self.schedules.lock().unwrap();
            schedules
                .get_mut(template.id())
                .and_then(VecDeque::pop_front)
                .unwrap_or(self.default_complete)
        };
        Ok(RenderEvent {
            complete,
            contents: if complete {
                b"{\"services\":{}}".to_vec()
            } else {
                Vec::new()
            },
        })
    }
}

/// Watcher double the test advances explicitly
pub struct VersionWatcher {
    version: watch::Sender<u64>,
}

impl Default for VersionWatcher {
    fn default() -> Self {
        let (version, _) = watch::channel(0);
        Self { version }
    }
}

impl VersionWatcher {
    /// Signal a registry change. Every subscription sees it on its next
    /// wait, including subscribers that are mid-cycle right now.
    pub fn trigger(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Watcher for VersionWatcher {
    fn subscribe(&self) -> WatchSubscription {
        WatchSubscription::new(self.version.subscribe())
    }
}

/// Watcher double whose subscriptions fail on their first wait
pub struct ClosedWatcher;

impl Watcher for ClosedWatcher {
    fn subscribe(&self) -> WatchSubscription {
        let (_, rx) = watch::channel(0);
        WatchSubscription::new(rx)
    }
}

/// Driver factory handing out pre-scripted drivers by task name
pub fn scripted_factory(drivers: Vec<ScriptedDriver>) -> DriverFactory {
    let drivers: Mutex<HashMap<String, ScriptedDriver>> = Mutex::new(
        drivers
            .into_iter()
            .map(|d| (d.task_name.clone(), d))
            .collect(),
    );
    Box::new(move |task, _files| {
        let driver = drivers
            .lock()
            .unwrap()
            .remove(&task.name)
            .unwrap_or_else(|| panic!("no scripted driver for task {}", task.name));
        Box::new(driver)
    })
}

pub fn empty_file_source() -> FileSource {
    Box::new(|_task| Ok(vec![]))
}

pub fn failing_file_source(message: &'static str) -> FileSource {
    Box::new(move |_task| Err(std::io::Error::other(message)))
}

/// Assemble an initialized-ready base controller around the mocks.
///
/// Workspace directories are pre-created under `root` since the scripted
/// drivers do not materialize anything.
pub fn base_with(
    root: PathBuf,
    tasks: Vec<Task>,
    watcher: Arc<dyn Watcher>,
    resolver: Arc<dyn Resolver>,
    store: Arc<EventStore>,
    drivers: Vec<ScriptedDriver>,
) -> BaseController {
    for t in &tasks {
        std::fs::create_dir_all(root.join(&t.name)).unwrap();
    }
    BaseController::with_collaborators(
        tasks,
        root,
        true,
        watcher,
        resolver,
        store,
        scripted_factory(drivers),
        empty_file_source(),
    )
}

/// A generated file for init tests
pub fn generated(name: &str) -> GeneratedFile {
    GeneratedFile {
        name: name.to_string(),
        contents: b"# generated".to_vec(),
    }
}
