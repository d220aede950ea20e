use std::sync::{Arc, Mutex};
use log::{debug, info};
use tokio::sync::oneshot;
use crate::audio::{AudioDevice, OutputHandle, PlaybackOutcome};
use crate::error::AudioError;
use crate::lock;
use crate::models::SamplesBuffer;

struct ActivePlayback {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct SinkState {
    owner: Option<String>,
    handle: Option<Arc<dyn OutputHandle>>,
    active: Option<ActivePlayback>,
    generation: u64,
}

/// Exclusive owner of the one playable output.
///
/// A station must `acquire` the sink under its own name before playing.
/// A second owner is refused with `AlreadyOwned` until the first one
/// releases. Every `play` stops the previous source first, so at most one
/// source is ever sounding. Clones share the same device and token.
#[derive(Clone)]
pub struct AudioSink {
    device: Arc<dyn AudioDevice>,
    state: Arc<Mutex<SinkState>>,
}

impl AudioSink {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(SinkState::default())),
        }
    }

    pub fn device_name(&self) -> String {
        self.device.name()
    }

    /// Idempotent for the same owner; resumes the context if it was opened before
    pub fn acquire(&self, owner: &str) -> Result<(), AudioError> {
        let mut state = lock(&self.state);

        if let Some(current) = &state.owner {
            if current != owner {
                return Err(AudioError::AlreadyOwned { owner: current.clone() });
            }
        }

        if let Some(handle) = state.handle.clone() {
            handle.resume()?;
        } else {
            let handle = self.device.open()?;
            info!("Opened audio output '{}'", self.device.name());
            state.handle = Some(handle);
        }

        if state.owner.is_none() {
            debug!("Audio output acquired by '{}'", owner);
            state.owner = Some(owner.to_string());
        }
        Ok(())
    }

    /// Give up ownership; stops any sound. Ignored for a non-owner.
    pub fn release(&self, owner: &str) {
        let mut state = lock(&self.state);
        if state.owner.as_deref() != Some(owner) {
            return;
        }
        Self::stop_locked(&mut state);
        state.owner = None;
        debug!("Audio output released by '{}'", owner);
    }

    pub fn current_owner(&self) -> Option<String> {
        lock(&self.state).owner.clone()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    /// Play `buffer` and wait for it to end.
    ///
    /// Always resolves: `Completed` at the natural end, `Interrupted` when
    /// `stop()` or a newer `play` cut it off.
    pub async fn play(
        &self,
        owner: &str,
        buffer: Arc<SamplesBuffer>,
        speed: f32,
    ) -> Result<PlaybackOutcome, AudioError> {
        let (completion, mut cancel_rx, generation) = {
            let mut state = lock(&self.state);
            if state.owner.as_deref() != Some(owner) {
                return Err(match &state.owner {
                    Some(other) => AudioError::AlreadyOwned { owner: other.clone() },
                    None => AudioError::NotAcquired,
                });
            }
            let handle = state.handle.clone().ok_or(AudioError::NotAcquired)?;

            Self::stop_locked(&mut state);

            let completion = handle.play(buffer, speed)?;
            let (cancel_tx, cancel_rx) = oneshot::channel();
            state.generation += 1;
            let generation = state.generation;
            state.active = Some(ActivePlayback { generation, cancel: cancel_tx });
            (completion, cancel_rx, generation)
        };

        let outcome = tokio::select! {
            outcome = completion.wait() => outcome,
            _ = &mut cancel_rx => PlaybackOutcome::Interrupted,
        };

        let mut state = lock(&self.state);
        if state.active.as_ref().map(|a| a.generation) == Some(generation) {
            state.active = None;
        }
        Ok(outcome)
    }

    /// Halt playback immediately; safe when nothing is playing
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        Self::stop_locked(&mut state);
    }

    /// Stop only if `owner` holds the sink; another station's audio is left alone
    pub fn stop_owned(&self, owner: &str) -> bool {
        let mut state = lock(&self.state);
        if state.owner.as_deref() != Some(owner) {
            return false;
        }
        Self::stop_locked(&mut state);
        true
    }

    fn stop_locked(state: &mut SinkState) {
        if let Some(handle) = &state.handle {
            handle.stop();
        }
        if let Some(active) = state.active.take() {
            let _ = active.cancel.send(());
        }
    }
}
