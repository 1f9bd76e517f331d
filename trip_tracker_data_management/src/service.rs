use tokio::sync::{broadcast, mpsc};

use crate::{
    fix_source::{FixDelivery, FixSink, FixSource, FixWatch},
    recorder::{Recorder, RecorderView},
    replay_player::{ReplayEvent, ReplayId, ReplayPlayer},
    storage::KeyValueStorage,
};

const VIEW_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop { name: Option<String> },
    DeleteTrip(i64),
    ReplayTrip(i64),
    SelectTrip(i64),
    ToggleCameraLock,
    Shutdown,
}

/// The presentation side of a [`RecorderService`]: sends commands, receives views.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    commands: mpsc::UnboundedSender<Command>,
    views: broadcast::Sender<RecorderView>,
}

impl RecorderHandle {
    /// Returns false once the service has shut down.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderView> {
        self.views.subscribe()
    }
}

/// Runs a [`Recorder`] on one task. Commands, fixes and replay ticks are handled one at a
/// time, each to completion, and a fresh view is published after every one of them.
/// Pending fixes and replay ticks go before pending commands.
pub struct RecorderService<S: KeyValueStorage, F: FixSource> {
    recorder: Recorder<S>,

    fix_source: F,
    fix_watch: Option<FixWatch>,
    generation: u64,
    fix_tx: mpsc::UnboundedSender<FixDelivery>,
    fix_rx: mpsc::UnboundedReceiver<FixDelivery>,

    replay_player: ReplayPlayer,
    active_replay: Option<ReplayId>,
    replay_tx: mpsc::UnboundedSender<ReplayEvent>,
    replay_rx: mpsc::UnboundedReceiver<ReplayEvent>,

    commands: mpsc::UnboundedReceiver<Command>,
    views: broadcast::Sender<RecorderView>,
}

impl<S: KeyValueStorage, F: FixSource> RecorderService<S, F> {
    pub fn new(recorder: Recorder<S>, fix_source: F) -> (Self, RecorderHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (views, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        let (fix_tx, fix_rx) = mpsc::unbounded_channel();
        let (replay_tx, replay_rx) = mpsc::unbounded_channel();
        let replay_player = ReplayPlayer::new(recorder.config().replay_cadence);

        let handle = RecorderHandle {
            commands: command_tx,
            views: views.clone(),
        };

        let service = Self {
            recorder,
            fix_source,
            fix_watch: None,
            generation: 0,
            fix_tx,
            fix_rx,
            replay_player,
            active_replay: None,
            replay_tx,
            replay_rx,
            commands,
            views,
        };

        (service, handle)
    }

    /// Handles events until [`Command::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) -> Recorder<S> {
        tracing::info!("Recorder service running");
        self.publish();

        loop {
            // Fixes queued ahead of a command are ingested before it
            tokio::select! {
                biased;
                Some(delivery) = self.fix_rx.recv() => self.handle_fix(delivery),
                Some(event) = self.replay_rx.recv() => self.handle_replay(event),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
            self.publish();
        }

        self.clear_fix_watch();
        self.replay_player.cancel();
        tracing::info!("Recorder service stopped");
        self.recorder
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!("Command: {:?}", command);
        match command {
            Command::Start => {
                if self.recorder.start_tracking() {
                    self.replay_player.cancel();
                    self.active_replay = None;

                    self.generation += 1;
                    let sink = FixSink::new(self.generation, self.fix_tx.clone());
                    self.fix_watch = Some(self.fix_source.watch(sink));
                }
            }
            Command::Stop { name } => {
                // No fix may reach the session once stop has been issued
                self.clear_fix_watch();
                self.recorder.stop_tracking(name);
            }
            Command::DeleteTrip(id) => {
                self.recorder.delete_trip(id);
            }
            Command::ReplayTrip(id) => match self.recorder.trip_path(id) {
                Some(path) => {
                    self.recorder.set_replay_position(None);
                    self.active_replay = Some(self.replay_player.replay(path, self.replay_tx.clone()));
                }
                None => tracing::warn!("Replay of unknown trip {id}"),
            },
            Command::SelectTrip(id) => {
                if !self.recorder.select_trip(id) {
                    tracing::warn!("Selected unknown trip {id}");
                }
            }
            Command::ToggleCameraLock => {
                self.recorder.toggle_camera_lock();
            }
            Command::Shutdown => {}
        }
    }

    fn handle_fix(&mut self, delivery: FixDelivery) {
        if delivery.generation != self.generation || !self.recorder.is_tracking() {
            tracing::debug!("Dropped fix from stale watch {}", delivery.generation);
            return;
        }

        match delivery.fix {
            Ok(fix) => {
                self.recorder.ingest(&fix);
            }
            Err(err) => self.recorder.report_fix_error(err),
        }
    }

    fn handle_replay(&mut self, event: ReplayEvent) {
        if self.active_replay != Some(event.replay_id()) {
            return;
        }

        match event {
            ReplayEvent::Position { position, .. } => self.recorder.set_replay_position(Some(position)),
            ReplayEvent::Finished { .. } => {
                self.recorder.set_replay_position(None);
                self.active_replay = None;
            }
        }
    }

    fn clear_fix_watch(&mut self) {
        if let Some(mut watch) = self.fix_watch.take() {
            watch.clear();
        }
    }

    fn publish(&self) {
        // No subscribers is fine
        let _ = self.views.send(self.recorder.view());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use trip_tracker_lib::{
        config::TrackerConfig,
        coordinate::Coordinate,
        position_fix::{FixError, PositionFix},
        trip::{Trip, TripArchive},
    };

    use super::*;
    use crate::{fix_source::ScriptedFixSource, storage::MemoryStorage, trip_store::TripStore};

    const KEY: &str = "saved_trips";

    fn fix(lat: f64, lon: f64, speed: f64) -> PositionFix {
        PositionFix::new(Coordinate::new(lat, lon)).with_speed(speed)
    }

    /// Hands the sink to the test so fixes can be pushed by hand, even after the watch is cleared.
    #[derive(Clone, Default)]
    struct ManualFixSource {
        sink: Arc<Mutex<Option<FixSink>>>,
    }

    impl ManualFixSource {
        fn push(&self, fix: PositionFix) {
            let sink = self.sink.lock().unwrap().clone().unwrap();
            sink.deliver(Ok(fix));
        }
    }

    impl FixSource for ManualFixSource {
        fn watch(&mut self, sink: FixSink) -> FixWatch {
            *self.sink.lock().unwrap() = Some(sink);
            FixWatch::new(tokio::spawn(std::future::pending::<()>()))
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn records_trip_from_fix_stream() {
        let storage = MemoryStorage::new();
        let recorder = Recorder::new(TrackerConfig::default(), storage.clone());
        let source = ScriptedFixSource::new(
            vec![
                Ok(fix(10., 10., 0.)),
                Ok(fix(10.0001, 10., 5.)),
                Err(FixError::Timeout),
                // ~0.1 m further, jitter
                Ok(fix(10.000101, 10., 9.)),
            ],
            Duration::from_secs(1),
        );
        let (service, handle) = RecorderService::new(recorder, source);
        let mut views = handle.subscribe();
        let task = tokio::spawn(service.run());

        handle.send(Command::Start);
        tokio::time::sleep(Duration::from_secs(10)).await;

        let mut last_view = None;
        while let Ok(view) = views.try_recv() {
            last_view = Some(view);
        }
        let view = last_view.unwrap();
        assert!(view.tracking);
        assert_eq!(view.path.len(), 2);
        assert_eq!(view.stats.speed_kmh, 18.);
        assert_eq!(view.status, "ERR: Timeout expired");

        handle.send(Command::Stop { name: Some("Loop".into()) });
        handle.send(Command::Shutdown);
        let recorder = task.await.unwrap();

        let trip = &recorder.archive().trips()[0];
        assert_eq!(trip.name, "Loop");
        assert_eq!(trip.path.len(), 2);
        assert_eq!(trip.distance_km, 0.01);
        assert_eq!(TripStore::new(storage, KEY).load(), *recorder.archive());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_exhausted_script_keeps_every_fix() {
        let fixes: Vec<PositionFix> = (0..50).map(|i| fix(10. + i as f64 * 0.001, 10., 1.)).collect();
        let source = ScriptedFixSource::from_fixes(fixes, Duration::ZERO);
        let exhausted = source.exhausted();
        let recorder = Recorder::new(TrackerConfig::default(), MemoryStorage::new());
        let (service, handle) = RecorderService::new(recorder, source);
        let task = tokio::spawn(service.run());

        handle.send(Command::Start);
        exhausted.notified().await;
        handle.send(Command::Stop { name: Some("Gpx".into()) });
        handle.send(Command::Shutdown);

        let recorder = task.await.unwrap();
        assert_eq!(recorder.archive().trips()[0].path.len(), 50);
        assert_eq!(recorder.status().to_string(), "SAVED: Gpx");
    }

    #[tokio::test(start_paused = true)]
    async fn fixes_after_stop_are_dropped() {
        let source = ManualFixSource::default();
        let recorder = Recorder::new(TrackerConfig::default(), MemoryStorage::new());
        let (service, handle) = RecorderService::new(recorder, source.clone());
        let task = tokio::spawn(service.run());

        handle.send(Command::Start);
        settle().await;
        source.push(fix(10., 10., 0.));
        settle().await;
        handle.send(Command::Stop { name: Some("First".into()) });
        settle().await;

        // The stale sink of the first watch keeps talking
        let stale = source.sink.lock().unwrap().clone().unwrap();
        stale.deliver(Ok(fix(10.01, 10., 0.)));
        settle().await;

        handle.send(Command::Start);
        settle().await;
        stale.deliver(Ok(fix(10.02, 10., 0.)));
        settle().await;
        handle.send(Command::Stop { name: None });
        handle.send(Command::Shutdown);

        let recorder = task.await.unwrap();
        assert_eq!(recorder.archive().len(), 1);
        assert_eq!(recorder.archive().trips()[0].path, vec![Coordinate::new(10., 10.)]);
        assert_eq!(recorder.status().to_string(), "INSUFFICIENT_DATA");
    }

    #[tokio::test(start_paused = true)]
    async fn replay_moves_display_position_then_clears() {
        let storage = MemoryStorage::new();
        let path = vec![Coordinate::new(1., 1.), Coordinate::new(2., 2.), Coordinate::new(3., 3.)];
        let mut archive = TripArchive::new();
        archive.add(Trip::new(42, "Stored".into(), 0.3, 10., path.clone()));
        TripStore::new(storage.clone(), KEY).save(&archive).unwrap();

        let recorder = Recorder::new(TrackerConfig::default(), storage);
        let (service, handle) = RecorderService::new(recorder, ManualFixSource::default());
        let mut views = handle.subscribe();
        let task = tokio::spawn(service.run());

        handle.send(Command::ReplayTrip(42));
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.send(Command::Shutdown);
        task.await.unwrap();

        let mut replayed = Vec::new();
        let mut last_view = None;
        while let Ok(view) = views.try_recv() {
            if let Some(position) = view.replay_position {
                assert_eq!(view.display_position, position);
                if replayed.last() != Some(&position) {
                    replayed.push(position);
                }
            }
            last_view = Some(view);
        }

        assert_eq!(replayed, path);
        let last_view = last_view.unwrap();
        assert_eq!(last_view.replay_position, None);
        assert_eq!(last_view.display_position, TrackerConfig::default().fallback_position);
    }

    #[tokio::test(start_paused = true)]
    async fn start_preempts_replay() {
        let storage = MemoryStorage::new();
        let path: Vec<Coordinate> = (0..10).map(|i| Coordinate::new(i as f64, 0.)).collect();
        let mut archive = TripArchive::new();
        archive.add(Trip::new(1, "Long".into(), 1000., 10., path));
        TripStore::new(storage.clone(), KEY).save(&archive).unwrap();

        let recorder = Recorder::new(TrackerConfig::default(), storage);
        let (service, handle) = RecorderService::new(recorder, ManualFixSource::default());
        let mut views = handle.subscribe();
        let task = tokio::spawn(service.run());

        handle.send(Command::ReplayTrip(1));
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.send(Command::Start);
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.send(Command::Shutdown);
        task.await.unwrap();

        let mut last_view = None;
        while let Ok(view) = views.try_recv() {
            last_view = Some(view);
        }
        let last_view = last_view.unwrap();
        assert!(last_view.tracking);
        assert_eq!(last_view.replay_position, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_ends_the_service() {
        let recorder = Recorder::new(TrackerConfig::default(), MemoryStorage::new());
        let (service, handle) = RecorderService::new(recorder, ManualFixSource::default());
        let task = tokio::spawn(service.run());

        handle.send(Command::ToggleCameraLock);
        drop(handle);

        let recorder = task.await.unwrap();
        assert!(!recorder.view().camera_locked);
    }
}
