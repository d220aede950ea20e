pub mod controller;
mod state;

pub use controller::EngineController;

use std::sync::Arc;
use std::time::Duration;
use log::{debug, info};
use tokio::sync::watch;
use crate::audio::{AudioSink, PlaybackOutcome};
use crate::config::StationConfig;
use crate::error_recovery::{ErrorRecoveryManager, RecoveryAction};
use crate::logging::{OperationTimer, StationLogger};
use crate::models::{BroadcastItem, EngineState, ItemId, StopReason};
use crate::queue::PlayoutQueue;
use crate::synth::SpeechSynthesizer;
use state::Shared;

/// Why an await inside the loop ended
enum Wake {
    Elapsed,
    Interrupted,
}

/// One station's continuous playout loop.
///
/// Runs as a single tokio task per station. The loop owns no cursor of its
/// own: it reads the current item id from the shared control block at the
/// top of every pass and writes the successor back after the item is done.
/// Stop and skip bump the interrupt epoch, which cancels whatever the loop
/// is awaiting (synthesis, playback, backoff or empty-queue poll).
pub(crate) struct PlayoutEngine {
    shared: Arc<Shared>,
    queue: PlayoutQueue,
    sink: AudioSink,
    synth: Arc<dyn SpeechSynthesizer>,
    config: StationConfig,
    logger: StationLogger,
    recovery: ErrorRecoveryManager,
    interrupts: watch::Receiver<u64>,
    idle_logged: bool,
}

impl PlayoutEngine {
    pub(crate) fn new(
        shared: Arc<Shared>,
        queue: PlayoutQueue,
        sink: AudioSink,
        synth: Arc<dyn SpeechSynthesizer>,
        config: StationConfig,
        logger: StationLogger,
    ) -> Self {
        let recovery = ErrorRecoveryManager::new(logger.clone(), shared.station.clone(), config.transient_backoff());
        let interrupts = shared.subscribe_interrupts();
        Self {
            shared,
            queue,
            sink,
            synth,
            config,
            logger,
            recovery,
            interrupts,
            idle_logged: false,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("[{}] Playout loop running", self.shared.station);

        loop {
            // Mark interrupts seen before reading control, so a stop or skip
            // that lands after this point still wakes the awaits below.
            self.interrupts.borrow_and_update();
            let (stop_requested, current) = {
                let control = self.shared.control();
                (control.stop_requested, control.current)
            };
            if stop_requested {
                break;
            }

            let Some((index, item)) = self.queue.resolve(current) else {
                self.wait_for_items().await;
                continue;
            };
            self.idle_logged = false;
            self.bind_cursor(current, item.id());

            let buffer = match self.synthesize(&item).await {
                Some(Ok(buffer)) => buffer,
                Some(Err(action)) => match action {
                    RecoveryAction::HaltFatal => {
                        self.halt_fatal();
                        return;
                    }
                    RecoveryAction::BackoffAndAdvance(backoff) => {
                        if let Wake::Elapsed = self.pause(backoff).await {
                            self.advance_past(item.id());
                        }
                        continue;
                    }
                },
                // stop or skip arrived mid-synthesis: never play this item
                None => continue,
            };

            match self.play(&item, index, buffer).await {
                Some(PlaybackOutcome::Completed) => self.advance_past(item.id()),
                Some(PlaybackOutcome::Interrupted) => {
                    // cut off without a stop or skip: treat as done
                    if !self.interrupts.has_changed().unwrap_or(true) {
                        self.advance_past(item.id());
                    }
                }
                None => {}
            }
        }

        self.finish_user_stop();
    }

    async fn wait_for_items(&mut self) {
        let poll = self.config.empty_poll_interval();
        if !self.idle_logged {
            self.logger.log_queue_empty(&self.shared.station, poll);
            self.idle_logged = true;
        }
        self.pause(poll).await;
    }

    /// `None` when interrupted; `Some(Err)` carries the recovery decision
    async fn synthesize(&mut self, item: &BroadcastItem) -> Option<Result<Arc<crate::models::SamplesBuffer>, RecoveryAction>> {
        let text = item.spoken_text(&self.config.text_separator);
        let timer = OperationTimer::new(format!("synthesize {}", item.id().short()));

        let result = tokio::select! {
            result = self.synth.synthesize(&text) => result,
            _ = self.interrupts.changed() => return None,
        };
        self.logger.update_synthesis_metrics(&self.shared.station, timer.finish());

        Some(match result {
            Ok(buffer) => Ok(Arc::new(buffer)),
            Err(e) => Err(self.recovery.on_synthesis_failure(item.id(), &e)),
        })
    }

    /// `None` when a stop or skip cut the item off
    async fn play(
        &mut self,
        item: &BroadcastItem,
        index: usize,
        buffer: Arc<crate::models::SamplesBuffer>,
    ) -> Option<PlaybackOutcome> {
        if self.interrupts.has_changed().unwrap_or(true) {
            return None;
        }

        // Speed is read fresh per item; a change lands on the next item
        let speed = self.shared.control().speed;
        let station = self.shared.station.clone();
        self.logger.log_item_started(&station, item.id(), item.title(), speed);
        debug!("[{}] Slot {} ({})", station, index, item.kind().as_str());
        self.shared.publish_voice(true);

        let airtime = tokio::time::Instant::now();
        let result = tokio::select! {
            result = self.sink.play(&station, buffer, speed) => Some(result),
            _ = self.interrupts.changed() => None,
        };
        self.shared.publish_voice(false);

        let Some(result) = result else {
            self.sink.stop_owned(&station);
            self.logger.log_item_interrupted(&station, item.id());
            return None;
        };

        match result {
            Ok(PlaybackOutcome::Completed) => {
                self.logger.log_item_completed(&station, item.id(), airtime.elapsed());
                self.recovery.on_success(item.id());
                Some(PlaybackOutcome::Completed)
            }
            Ok(PlaybackOutcome::Interrupted) => {
                self.logger.log_item_interrupted(&station, item.id());
                if self.interrupts.has_changed().unwrap_or(true) {
                    None
                } else {
                    Some(PlaybackOutcome::Interrupted)
                }
            }
            Err(e) => {
                let RecoveryAction::BackoffAndAdvance(backoff) = self.recovery.on_playback_failure(item.id(), &e) else {
                    return None;
                };
                match self.pause(backoff).await {
                    Wake::Elapsed => Some(PlaybackOutcome::Interrupted),
                    Wake::Interrupted => None,
                }
            }
        }
    }

    async fn pause(&mut self, duration: Duration) -> Wake {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Wake::Elapsed,
            _ = self.interrupts.changed() => Wake::Interrupted,
        }
    }

    /// Point the cursor at the item actually resolved (e.g. index 0 after a
    /// replace) unless a skip moved it meanwhile
    fn bind_cursor(&self, seen: Option<ItemId>, resolved: ItemId) {
        if seen == Some(resolved) {
            return;
        }
        let mut control = self.shared.control();
        if control.current == seen {
            control.current = Some(resolved);
        }
    }

    /// Move the cursor to the successor of `done`, unless a skip already
    /// moved it. Checked under the control lock, which skip also holds
    /// while it bumps the epoch.
    fn advance_past(&mut self, done: ItemId) {
        let next = self.queue.advance(Some(done)).map(|item| item.id());
        let mut control = self.shared.control();
        if control.current == Some(done) && !self.interrupts.has_changed().unwrap_or(true) {
            control.current = next;
        }
        drop(control);
        self.recovery.retain_items(&self.queue.ids());
    }

    fn halt_fatal(&self) {
        let station = &self.shared.station;
        self.sink.stop_owned(station);
        {
            let mut control = self.shared.control();
            control.state = EngineState::Stopped;
            control.stop_reason = Some(StopReason::Fatal);
            control.stop_requested = false;
        }
        self.sink.release(station);
        self.shared.publish_voice(false);
        self.logger.log_station_stopped(station, StopReason::Fatal);
    }

    fn finish_user_stop(&self) {
        let station = &self.shared.station;
        self.sink.stop_owned(station);
        self.sink.release(station);
        {
            let mut control = self.shared.control();
            control.state = EngineState::Stopped;
            control.stop_reason = Some(StopReason::UserRequested);
            control.stop_requested = false;
        }
        self.shared.publish_voice(false);
        self.logger.log_station_stopped(station, StopReason::UserRequested);
        info!("[{}] Playout loop exited", station);
    }
}
