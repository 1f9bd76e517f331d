use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use trip_tracker_lib::{coordinate::Coordinate, replay::ReplayCursor};

pub type ReplayId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    Position {
        replay_id: ReplayId,
        index: usize,
        position: Coordinate,
    },
    /// No replay in progress anymore.
    Finished { replay_id: ReplayId },
}

impl ReplayEvent {
    pub fn replay_id(&self) -> ReplayId {
        match self {
            ReplayEvent::Position { replay_id, .. } | ReplayEvent::Finished { replay_id } => *replay_id,
        }
    }
}

/// Handle to one running replay timer. Cancelling twice is fine.
#[derive(Debug)]
pub struct ReplaySubscription {
    replay_id: ReplayId,
    task: Option<JoinHandle<()>>,
}

impl ReplaySubscription {
    pub fn replay_id(&self) -> ReplayId {
        self.replay_id
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Replay {} cancelled", self.replay_id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ReplaySubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Animates recorded paths at a fixed cadence. At most one replay runs at a time.
#[derive(Debug)]
pub struct ReplayPlayer {
    cadence: Duration,
    last_id: ReplayId,
    active: Option<ReplaySubscription>,
}

impl ReplayPlayer {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            last_id: 0,
            active: None,
        }
    }

    /// Starts replaying `path` from its first point, superseding any running replay.
    ///
    /// Points are sent one cadence apart, starting one cadence from now, and a
    /// [`ReplayEvent::Finished`] follows one cadence after the last point. An empty path
    /// finishes right away.
    pub fn replay(&mut self, path: Vec<Coordinate>, sink: mpsc::UnboundedSender<ReplayEvent>) -> ReplayId {
        self.cancel();

        self.last_id += 1;
        let replay_id = self.last_id;

        let cursor = ReplayCursor::new(path);
        if cursor.is_empty() {
            tracing::debug!("Replay {replay_id} has nothing to play");
            let _ = sink.send(ReplayEvent::Finished { replay_id });
            return replay_id;
        }

        tracing::info!("Replay {replay_id} started with {} points", cursor.len());
        let task = tokio::spawn(run_replay(replay_id, cursor, self.cadence, sink));
        self.active = Some(ReplaySubscription {
            replay_id,
            task: Some(task),
        });

        replay_id
    }

    pub fn cancel(&mut self) {
        if let Some(mut subscription) = self.active.take() {
            subscription.cancel();
        }
    }

    /// The running replay, if any.
    pub fn active_replay(&self) -> Option<ReplayId> {
        self.active
            .as_ref()
            .filter(|subscription| subscription.is_running())
            .map(ReplaySubscription::replay_id)
    }
}

async fn run_replay(
    replay_id: ReplayId,
    mut cursor: ReplayCursor,
    cadence: Duration,
    sink: mpsc::UnboundedSender<ReplayEvent>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + cadence, cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let index = cursor.index();
        let Some(position) = cursor.next() else {
            tracing::info!("Replay {replay_id} finished");
            let _ = sink.send(ReplayEvent::Finished { replay_id });
            return;
        };

        if sink
            .send(ReplayEvent::Position {
                replay_id,
                index,
                position,
            })
            .is_err()
        {
            return;
        }
    }
}
