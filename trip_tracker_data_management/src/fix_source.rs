use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, Notify},
    task::JoinHandle,
};
use trip_tracker_lib::position_fix::{FixError, PositionFix};

pub type FixResult = Result<PositionFix, FixError>;

/// A fix (or sensor error) tagged with the watch generation it was delivered for.
#[derive(Debug, Clone, PartialEq)]
pub struct FixDelivery {
    pub generation: u64,
    pub fix: FixResult,
}

/// Where a [`FixSource`] sends its fixes for one watch.
#[derive(Debug, Clone)]
pub struct FixSink {
    generation: u64,
    tx: mpsc::UnboundedSender<FixDelivery>,
}

impl FixSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<FixDelivery>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once nobody is listening anymore.
    pub fn deliver(&self, fix: FixResult) -> bool {
        self.tx
            .send(FixDelivery {
                generation: self.generation,
                fix,
            })
            .is_ok()
    }
}

/// A device location service.
pub trait FixSource {
    /// Starts continuous delivery into `sink` until the returned watch is cleared.
    fn watch(&mut self, sink: FixSink) -> FixWatch;
}

/// Handle to a running watch. Clearing stops delivery; clearing twice is fine.
#[derive(Debug)]
pub struct FixWatch {
    task: Option<JoinHandle<()>>,
}

impl FixWatch {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn clear(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Fix watch cleared");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for FixWatch {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Plays back a fixed list of fixes, one per `interval`. Drives `record` from GPX files, and tests.
#[derive(Debug, Clone)]
pub struct ScriptedFixSource {
    fixes: Vec<FixResult>,
    interval: Duration,
    exhausted: Arc<Notify>,
}

impl ScriptedFixSource {
    pub fn new(fixes: Vec<FixResult>, interval: Duration) -> Self {
        Self {
            fixes,
            interval,
            exhausted: Arc::new(Notify::new()),
        }
    }

    pub fn from_fixes(fixes: Vec<PositionFix>, interval: Duration) -> Self {
        Self::new(fixes.into_iter().map(Ok).collect(), interval)
    }

    /// Notified once a watch has handed over its last fix.
    pub fn exhausted(&self) -> Arc<Notify> {
        self.exhausted.clone()
    }
}

impl FixSource for ScriptedFixSource {
    fn watch(&mut self, sink: FixSink) -> FixWatch {
        let fixes = self.fixes.clone();
        let interval = self.interval;
        let exhausted = self.exhausted.clone();

        FixWatch::new(tokio::spawn(async move {
            for fix in fixes {
                tokio::time::sleep(interval).await;
                if !sink.deliver(fix) {
                    break;
                }
            }
            tracing::debug!("Scripted fixes exhausted for watch {}", sink.generation());
            exhausted.notify_one();
        }))
    }
}
