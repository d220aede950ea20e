use std::sync::Arc;
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use crate::audio::AudioSink;
use crate::config::StationConfig;
use crate::engine::state::Shared;
use crate::engine::PlayoutEngine;
use crate::error::{EngineError, QueueError, StationError};
use crate::logging::{OperationTimer, StationLogger};
use crate::models::{BroadcastItem, EngineState, InjectPosition, ItemId, StationStatus, StopReason, VolumeIntent};
use crate::queue::PlayoutQueue;
use crate::synth::{SpeechSynthesizer, TimedSynthesizer};

/// Command surface of one station.
///
/// Every UI intent goes through here. The controller never touches the
/// loop's await points directly: it edits the shared control block and
/// bumps the interrupt epoch, and the loop picks the change up.
pub struct EngineController {
    shared: Arc<Shared>,
    queue: PlayoutQueue,
    sink: AudioSink,
    synth: Arc<dyn SpeechSynthesizer>,
    config: StationConfig,
    logger: StationLogger,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl EngineController {
    /// Fails with `ConfigError::InvalidValue` when the speed range or timings are unusable
    pub fn new(
        station: impl Into<String>,
        sink: AudioSink,
        synth: Arc<dyn SpeechSynthesizer>,
        queue: PlayoutQueue,
        config: StationConfig,
        logger: StationLogger,
    ) -> Result<Self, StationError> {
        config.validate()?;

        let shared = Arc::new(Shared::new(
            station.into(),
            config.clamp_speed(config.default_speed),
            config.talkover,
            config.background_level,
            config.duck_level,
        ));
        let synth: Arc<dyn SpeechSynthesizer> = Arc::new(TimedSynthesizer::new(synth, config.synthesis_timeout()));

        Ok(Self {
            shared,
            queue,
            sink,
            synth,
            config,
            logger,
            task: AsyncMutex::new(None),
        })
    }

    pub fn station_name(&self) -> &str {
        &self.shared.station
    }

    pub fn queue(&self) -> &PlayoutQueue {
        &self.queue
    }

    pub fn logger(&self) -> &StationLogger {
        &self.logger
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn device_name(&self) -> String {
        self.sink.device_name()
    }

    /// Start playing from `from_index`, or from the cursor (index 0 when unset).
    ///
    /// A no-op while already Playing or Connecting. Refused with
    /// `NeedsAttention` after a fatal stop until `acknowledge_fault`. A
    /// device that cannot be acquired leaves the station Idle.
    pub async fn start(&self, from_index: Option<usize>) -> Result<(), StationError> {
        let mut task = self.task.lock().await;

        if self.refuse_start()? {
            return Ok(());
        }

        // A stop may still be winding down the previous loop
        if let Some(previous) = task.take() {
            if let Err(e) = previous.await {
                warn!("[{}] Previous playout loop ended abnormally: {}", self.shared.station, e);
            }
        }
        if self.refuse_start()? {
            return Ok(());
        }

        let target = match from_index {
            Some(index) if !self.queue.is_empty() => {
                let item = self.queue.get(index).ok_or(QueueError::InvalidIndex { index })?;
                Some(item.id())
            }
            _ => None,
        };

        {
            let mut control = self.shared.control();
            control.state = EngineState::Connecting;
            control.stop_reason = None;
            control.stop_requested = false;
            if target.is_some() {
                control.current = target;
            }
        }

        let timer = OperationTimer::new("acquire audio output");
        if let Err(e) = self.sink.acquire(&self.shared.station) {
            self.shared.control().state = EngineState::Idle;
            self.logger.log_device_error(&self.shared.station, &e.to_string());
            return Err(e.into());
        }
        self.logger.update_device_metrics(&self.shared.station, timer.finish());

        let engine = PlayoutEngine::new(
            Arc::clone(&self.shared),
            self.queue.clone(),
            self.sink.clone(),
            Arc::clone(&self.synth),
            self.config.clone(),
            self.logger.clone(),
        );

        let current = {
            let mut control = self.shared.control();
            if control.stop_requested {
                control.state = EngineState::Stopped;
                control.stop_reason = Some(StopReason::UserRequested);
                control.stop_requested = false;
                None
            } else {
                control.state = EngineState::Playing;
                Some(control.current)
            }
        };

        let Some(current) = current else {
            self.sink.release(&self.shared.station);
            self.logger.log_station_stopped(&self.shared.station, StopReason::UserRequested);
            return Ok(());
        };

        let from = self.queue.resolve(current).map_or(0, |(index, _)| index);
        *task = Some(tokio::spawn(engine.run()));
        self.logger.log_station_started(&self.shared.station, from);
        Ok(())
    }

    /// `Ok(true)` when start has nothing to do
    fn refuse_start(&self) -> Result<bool, EngineError> {
        let control = self.shared.control();
        match control.state {
            EngineState::Playing | EngineState::Connecting => Ok(true),
            EngineState::Stopped if control.stop_reason == Some(StopReason::Fatal) => Err(EngineError::NeedsAttention),
            _ => Ok(false),
        }
    }

    /// Request a stop and silence the output now. Returns without waiting
    /// for the loop; calling it again changes nothing.
    pub fn stop(&self) {
        {
            let mut control = self.shared.control();
            if !matches!(control.state, EngineState::Playing | EngineState::Connecting) {
                return;
            }
            control.stop_requested = true;
            control.state = EngineState::StoppingRequested;
            self.shared.interrupt();
        }
        self.sink.stop_owned(&self.shared.station);
        info!("[{}] Stop requested", self.shared.station);
    }

    /// Cut the current item and continue from `index`; starts the station when it is not running
    pub async fn skip_to(&self, index: usize) -> Result<(), StationError> {
        let target = self.queue.get(index).ok_or(QueueError::InvalidIndex { index })?.id();

        let running = {
            let mut control = self.shared.control();
            match control.state {
                EngineState::Playing => {
                    control.current = Some(target);
                    self.shared.interrupt();
                    true
                }
                EngineState::Connecting => {
                    control.current = Some(target);
                    return Ok(());
                }
                _ => false,
            }
        };

        if running {
            self.sink.stop_owned(&self.shared.station);
            debug!("[{}] Skipping to slot {}", self.shared.station, index);
            return Ok(());
        }
        self.start(Some(index)).await
    }

    /// Clamp and store; applies from the next item on
    pub fn set_speed(&self, speed: f32) -> f32 {
        let speed = self.config.clamp_speed(speed);
        let previous = {
            let mut control = self.shared.control();
            std::mem::replace(&mut control.speed, speed)
        };
        if (previous - speed).abs() > f32::EPSILON {
            self.logger.log_speed_changed(&self.shared.station, previous, speed);
        }
        speed
    }

    pub fn cycle_speed(&self) -> f32 {
        let current = self.shared.control().speed;
        self.set_speed(self.config.next_cycle_speed(current))
    }

    pub fn speed(&self) -> f32 {
        self.shared.control().speed
    }

    /// Add an item without interrupting what is playing.
    ///
    /// `Front` means the front of the upcoming run: right after the current
    /// item, or at index 0 when there is none. Afterwards the queue is
    /// trimmed to `max_queue_len` in arrival order, never evicting the current
    /// item or the one just injected.
    pub fn inject(&self, item: BroadcastItem, position: InjectPosition) -> Result<(), StationError> {
        let id = item.id();
        let current = self.shared.control().current;

        match (position, current) {
            (InjectPosition::Back, _) => self.queue.append(item)?,
            (InjectPosition::Front, Some(anchor)) => {
                self.queue.insert_after(anchor, item)?;
            }
            (InjectPosition::Front, None) => self.queue.prepend(item)?,
        }
        self.logger.log_item_injected(&self.shared.station, id, position);

        if self.config.max_queue_len > 0 {
            let protect: Vec<ItemId> = current.into_iter().chain(Some(id)).collect();
            for evicted in self.queue.remove_oldest(self.config.max_queue_len, &protect) {
                debug!("[{}] Evicted {} to stay within {} items",
                    self.shared.station, evicted.display_name(), self.config.max_queue_len);
            }
        }
        Ok(())
    }

    /// Live interjection: queue at the front and cut over to it now
    pub async fn announce(&self, item: BroadcastItem) -> Result<(), StationError> {
        let id = item.id();
        self.inject(item, InjectPosition::Front)?;
        let index = self
            .queue
            .position_of(id)
            .ok_or_else(|| QueueError::ItemNotFound { id: id.to_string() })?;
        self.skip_to(index).await
    }

    /// Removing the current item lets it finish; the cursor moves to its successor
    pub fn remove(&self, id: ItemId) -> Result<BroadcastItem, StationError> {
        let mut control = self.shared.control();
        if !self.queue.contains(id) {
            return Err(QueueError::ItemNotFound { id: id.to_string() }.into());
        }
        if control.current == Some(id) {
            control.current = self.queue.advance(Some(id)).map(|next| next.id()).filter(|next| *next != id);
        }
        Ok(self.queue.remove(id)?)
    }

    /// Swap the whole rundown; an unknown cursor restarts from index 0
    pub fn replace_all(&self, items: Vec<BroadcastItem>) -> Result<(), StationError> {
        self.queue.replace_all(items)?;
        Ok(())
    }

    pub fn status(&self) -> StationStatus {
        self.shared.status(|id| self.queue.position_of(id), self.queue.len())
    }

    pub fn upcoming(&self, n: usize) -> Vec<BroadcastItem> {
        let current = self.shared.control().current;
        self.queue.upcoming(current, n)
    }

    pub fn volume_intent(&self) -> watch::Receiver<VolumeIntent> {
        self.shared.subscribe_volume()
    }

    pub fn set_talkover(&self, enabled: bool) {
        self.shared.control().talkover = enabled;
    }

    /// Clear a fatal stop so `start` is accepted again
    pub fn acknowledge_fault(&self) -> bool {
        let mut control = self.shared.control();
        if control.state == EngineState::Stopped && control.stop_reason == Some(StopReason::Fatal) {
            control.state = EngineState::Idle;
            control.stop_reason = None;
            info!("[{}] Fault acknowledged", self.shared.station);
            true
        } else {
            false
        }
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(&self) -> Result<(), StationError> {
        self.stop();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| EngineError::LoopAborted(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedAudioDevice;
    use crate::error::{AudioError, ConfigError};
    use crate::models::ItemKind;
    use crate::synth::scripted::{Behavior, ScriptedSynthesizer};
    use std::time::Duration;

    struct Fixture {
        controller: EngineController,
        device: SimulatedAudioDevice,
        synth: Arc<ScriptedSynthesizer>,
    }

    fn create_fixture(titles: &[&str]) -> Fixture {
        let items = titles
            .iter()
            .map(|title| BroadcastItem::manual(ItemKind::News, *title, "body"))
            .collect();
        let queue = PlayoutQueue::from_items(items).unwrap();
        let device = SimulatedAudioDevice::new();
        let synth = Arc::new(ScriptedSynthesizer::new());
        let controller = EngineController::new(
            "main",
            AudioSink::new(Arc::new(device.clone())),
            synth.clone(),
            queue,
            StationConfig::default(),
            StationLogger::new(),
        )
        .unwrap();
        Fixture { controller, device, synth }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_transitions() {
        let fx = create_fixture(&["X", "Y"]);
        assert_eq!(fx.controller.status().state, EngineState::Idle);

        fx.controller.start(None).await.unwrap();
        assert_eq!(fx.controller.status().state, EngineState::Playing);

        // second start is a no-op
        fx.controller.start(Some(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.controller.status().current_index, Some(0));

        fx.controller.stop();
        assert_eq!(fx.controller.status().state, EngineState::StoppingRequested);
        fx.controller.shutdown().await.unwrap();

        let status = fx.controller.status();
        assert_eq!(status.state, EngineState::Stopped);
        assert_eq!(status.stop_reason, Some(StopReason::UserRequested));
        assert_eq!(fx.device.active_sources(), 0);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_index() {
        let fx = create_fixture(&["X"]);
        let err = fx.controller.start(Some(5)).await.unwrap_err();
        assert!(matches!(err, StationError::Queue(QueueError::InvalidIndex { index: 5 })));
        assert_eq!(fx.controller.status().state, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_device_unavailable_leaves_station_idle() {
        let fx = create_fixture(&["X"]);
        fx.device.set_unavailable(true);

        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, StationError::Audio(AudioError::DeviceUnavailable(_))));
        assert_eq!(fx.controller.status().state, EngineState::Idle);
        assert!(fx.synth.calls().is_empty());

        fx.device.set_unavailable(false);
        fx.controller.start(None).await.unwrap();
        assert_eq!(fx.controller.status().state, EngineState::Playing);
        fx.controller.shutdown().await.unwrap();
    }

    #[test]
    fn test_set_speed_clamps() {
        let fx = create_fixture(&["X"]);
        assert_eq!(fx.controller.set_speed(3.0), 2.0);
        assert_eq!(fx.controller.set_speed(0.1), 0.5);
        assert_eq!(fx.controller.set_speed(f32::NAN), 1.0);
        assert_eq!(fx.controller.speed(), 1.0);
    }

    #[test]
    fn test_cycle_speed_wraps() {
        let fx = create_fixture(&["X"]);
        let seen: Vec<f32> = (0..5).map(|_| fx.controller.cycle_speed()).collect();
        assert_eq!(seen, vec![1.25, 1.5, 1.75, 1.0, 1.25]);
    }

    #[test]
    fn test_rejects_inverted_speed_range() {
        let config = StationConfig {
            min_speed: 2.0,
            max_speed: 1.0,
            ..StationConfig::default()
        };
        let result = EngineController::new(
            "main",
            AudioSink::new(Arc::new(SimulatedAudioDevice::new())),
            Arc::new(ScriptedSynthesizer::new()),
            PlayoutQueue::new(),
            config,
            StationLogger::new(),
        );
        assert!(matches!(
            result,
            Err(StationError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "min_speed"
        ));
    }

    #[test]
    fn test_inject_never_evicts_the_injected_item() {
        let config = StationConfig {
            max_queue_len: 2,
            ..StationConfig::default()
        };
        let items = vec![
            BroadcastItem::manual(ItemKind::News, "A", "body"),
            BroadcastItem::manual(ItemKind::News, "B", "body"),
        ];
        let controller = EngineController::new(
            "main",
            AudioSink::new(Arc::new(SimulatedAudioDevice::new())),
            Arc::new(ScriptedSynthesizer::new()),
            PlayoutQueue::from_items(items).unwrap(),
            config,
            StationLogger::new(),
        )
        .unwrap();

        let backdated = chrono::Utc::now() - chrono::Duration::minutes(5);
        let w = BroadcastItem::manual(ItemKind::Bulletin, "W", "body").with_created_at(backdated);
        controller.inject(w.clone(), InjectPosition::Back).unwrap();

        let titles: Vec<String> = controller.queue().snapshot().iter().map(|i| i.title().to_string()).collect();
        assert_eq!(titles, vec!["B", "W"]);
        assert!(controller.queue().contains(w.id()));
    }

    #[test]
    fn test_inject_front_without_cursor_prepends() {
        let fx = create_fixture(&["X", "Y"]);
        let w = BroadcastItem::manual(ItemKind::Bulletin, "W", "body");
        fx.controller.inject(w.clone(), InjectPosition::Front).unwrap();
        assert_eq!(fx.controller.queue().get(0).unwrap().id(), w.id());
    }

    #[test]
    fn test_inject_front_follows_cursor() {
        let fx = create_fixture(&["X", "Y", "Z"]);
        let y = fx.controller.queue().get(1).unwrap();
        fx.controller.shared.control().current = Some(y.id());

        let w = BroadcastItem::manual(ItemKind::Bulletin, "W", "body");
        fx.controller.inject(w.clone(), InjectPosition::Front).unwrap();
        assert_eq!(fx.controller.queue().position_of(w.id()), Some(2));
        assert_eq!(fx.controller.upcoming(1)[0].id(), w.id());
    }

    #[test]
    fn test_remove_current_moves_cursor_to_successor() {
        let fx = create_fixture(&["X", "Y", "Z"]);
        let x = fx.controller.queue().get(0).unwrap();
        let y = fx.controller.queue().get(1).unwrap();
        fx.controller.shared.control().current = Some(x.id());

        fx.controller.remove(x.id()).unwrap();
        let status = fx.controller.status();
        assert_eq!(status.current_item_id, Some(y.id()));
        assert_eq!(status.current_index, Some(0));

        assert!(fx.controller.remove(x.id()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_latch_requires_acknowledgement() {
        let fx = create_fixture(&["X"]);
        fx.synth.set_default(Behavior::QuotaExhausted);

        fx.controller.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fx.controller.status().needs_attention());

        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, StationError::Engine(EngineError::NeedsAttention)));

        assert!(fx.controller.acknowledge_fault());
        assert!(!fx.controller.acknowledge_fault());
        assert_eq!(fx.controller.status().state, EngineState::Idle);

        fx.synth.set_default(Behavior::Speak(Duration::from_secs(1)));
        fx.controller.start(None).await.unwrap();
        assert_eq!(fx.controller.status().state, EngineState::Playing);
        fx.controller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_when_idle_starts_at_index() {
        let fx = create_fixture(&["X", "Y", "Z"]);
        fx.controller.skip_to(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let z = fx.controller.queue().get(2).unwrap();
        assert_eq!(fx.controller.logger().items_started(Some("main")), vec![z.id()]);
        fx.controller.shutdown().await.unwrap();
    }
}
