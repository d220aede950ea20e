pub mod device;
pub mod resampler;
pub mod simulated;
pub mod sink;

use std::sync::Arc;
use tokio::sync::oneshot;
use crate::error::AudioError;
use crate::models::SamplesBuffer;

pub use device::CpalAudioDevice;
pub use resampler::SpeedCursor;
pub use simulated::{PlayRecord, SimulatedAudioDevice};
pub use sink::AudioSink;

/// How a play request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The buffer played to its natural end
    Completed,
    /// Cut off by `stop()` or by a newer source
    Interrupted,
}

/// Sending half of a playback completion, held by the output backend
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Option<oneshot::Sender<PlaybackOutcome>>,
}

impl CompletionSignal {
    /// Resolve the paired completion; later calls are ignored
    pub fn complete(&mut self, outcome: PlaybackOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

/// Resolves exactly once. A dropped signal counts as an interruption.
#[derive(Debug)]
pub struct PlaybackCompletion {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackCompletion {
    pub async fn wait(self) -> PlaybackOutcome {
        self.rx.await.unwrap_or(PlaybackOutcome::Interrupted)
    }
}

pub fn completion_pair() -> (CompletionSignal, PlaybackCompletion) {
    let (tx, rx) = oneshot::channel();
    (CompletionSignal { tx: Some(tx) }, PlaybackCompletion { rx })
}

/// An opened output: one playable context on a device
pub trait OutputHandle: Send + Sync {
    /// Start sounding `buffer` at `speed`; replaces anything already sounding
    fn play(&self, buffer: Arc<SamplesBuffer>, speed: f32) -> Result<PlaybackCompletion, AudioError>;

    /// Halt whatever is sounding; no-op when silent
    fn stop(&self);

    /// Bring a suspended context back; called on every repeated acquire
    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// A physical or simulated output device
pub trait AudioDevice: Send + Sync {
    fn open(&self) -> Result<Arc<dyn OutputHandle>, AudioError>;

    fn name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_resolves_with_sent_outcome() {
        let (mut signal, completion) = completion_pair();
        signal.complete(PlaybackOutcome::Completed);
        signal.complete(PlaybackOutcome::Interrupted);
        assert_eq!(completion.wait().await, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn test_dropped_signal_is_interruption() {
        let (signal, completion) = completion_pair();
        drop(signal);
        assert_eq!(completion.wait().await, PlaybackOutcome::Interrupted);
    }
}
