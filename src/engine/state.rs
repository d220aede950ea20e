use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use crate::lock;
use crate::models::{EngineState, ItemId, StationStatus, StopReason, VolumeIntent};

/// Authoritative station state, written by the controller and the loop
#[derive(Debug, Clone)]
pub(crate) struct Control {
    pub state: EngineState,
    pub stop_reason: Option<StopReason>,
    /// Cursor by identity; translated to an index only when read
    pub current: Option<ItemId>,
    pub speed: f32,
    pub talkover: bool,
    pub stop_requested: bool,
}

/// State shared between one station's controller and its playout loop
pub(crate) struct Shared {
    pub station: String,
    control: Mutex<Control>,
    /// Bumped by stop and skip so the loop drops whatever it is awaiting
    epoch: watch::Sender<u64>,
    volume: watch::Sender<VolumeIntent>,
    pub background_level: f32,
    pub duck_level: f32,
}

impl Shared {
    pub fn new(station: String, speed: f32, talkover: bool, background_level: f32, duck_level: f32) -> Self {
        let (epoch, _) = watch::channel(0);
        let (volume, _) = watch::channel(VolumeIntent::idle(background_level));
        Self {
            station,
            control: Mutex::new(Control {
                state: EngineState::Idle,
                stop_reason: None,
                current: None,
                speed,
                talkover,
                stop_requested: false,
            }),
            epoch,
            volume,
            background_level,
            duck_level,
        }
    }

    pub fn control(&self) -> MutexGuard<'_, Control> {
        lock(&self.control)
    }

    /// Wake the loop out of its current await. Call with the control lock
    /// held so the loop sees the new control state and the wake-up together.
    pub fn interrupt(&self) {
        self.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    pub fn subscribe_interrupts(&self) -> watch::Receiver<u64> {
        self.epoch.subscribe()
    }

    pub fn subscribe_volume(&self) -> watch::Receiver<VolumeIntent> {
        self.volume.subscribe()
    }

    pub fn publish_voice(&self, active: bool) {
        let talkover = self.control().talkover;
        let intent = match (active, talkover) {
            (true, true) => VolumeIntent { voice_active: true, background_level: self.duck_level },
            (true, false) => VolumeIntent { voice_active: true, background_level: self.background_level },
            (false, _) => VolumeIntent::idle(self.background_level),
        };
        self.volume.send_replace(intent);
    }

    pub fn status(&self, current_index: impl FnOnce(ItemId) -> Option<usize>, queue_len: usize) -> StationStatus {
        let control = self.control().clone();
        StationStatus {
            state: control.state,
            stop_reason: control.stop_reason,
            current_item_id: control.current,
            current_index: control.current.and_then(current_index),
            speed: control.speed,
            queue_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared::new("main".to_string(), 1.0, true, 1.0, 0.3)
    }

    #[test]
    fn test_initial_state() {
        let shared = shared();
        let control = shared.control();
        assert_eq!(control.state, EngineState::Idle);
        assert_eq!(control.stop_reason, None);
        assert!(!control.stop_requested);
    }

    #[test]
    fn test_interrupt_marks_receivers_changed() {
        let shared = shared();
        let mut rx = shared.subscribe_interrupts();
        assert!(!rx.has_changed().unwrap());

        shared.interrupt();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_voice_ducking() {
        let shared = shared();
        let rx = shared.subscribe_volume();

        shared.publish_voice(true);
        assert_eq!(*rx.borrow(), VolumeIntent { voice_active: true, background_level: 0.3 });

        shared.control().talkover = false;
        shared.publish_voice(true);
        assert_eq!(*rx.borrow(), VolumeIntent { voice_active: true, background_level: 1.0 });

        shared.publish_voice(false);
        assert_eq!(*rx.borrow(), VolumeIntent::idle(1.0));
    }

    #[test]
    fn test_status_translates_cursor() {
        let shared = shared();
        let id = ItemId::new();
        shared.control().current = Some(id);

        let status = shared.status(|_| Some(2), 3);
        assert_eq!(status.current_item_id, Some(id));
        assert_eq!(status.current_index, Some(2));
        assert_eq!(status.queue_len, 3);
    }
}
