use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use crate::audio::{completion_pair, AudioDevice, CompletionSignal, OutputHandle, PlaybackCompletion, PlaybackOutcome};
use crate::error::AudioError;
use crate::lock;
use crate::models::SamplesBuffer;

/// One play request seen by the simulated device
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRecord {
    pub speed: f32,
    pub duration: Duration,
    pub sample_count: usize,
}

struct Source {
    id: u64,
    signal: CompletionSignal,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Playback {
    sources: Vec<Source>,
    next_id: u64,
    max_concurrent: usize,
    plays: Vec<PlayRecord>,
}

#[derive(Default)]
struct Shared {
    unavailable: AtomicBool,
    fail_play: AtomicBool,
    opens: AtomicUsize,
    stops: AtomicUsize,
    playback: Mutex<Playback>,
}

/// Output device that "plays" by sleeping for the buffer's duration.
///
/// Sources are independent: the device does not stop an older source
/// itself, so `max_concurrent` shows whether callers kept to one at a time.
/// Timing follows the tokio clock, which tests pause and advance.
#[derive(Clone, Default)]
pub struct SimulatedAudioDevice {
    shared: Arc<Shared>,
}

impl SimulatedAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next open/resume fail with `DeviceUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make play requests fail with `PlaybackFailed`
    pub fn set_fail_play(&self, fail: bool) {
        self.shared.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn active_sources(&self) -> usize {
        lock(&self.shared.playback).sources.len()
    }

    pub fn max_concurrent(&self) -> usize {
        lock(&self.shared.playback).max_concurrent
    }

    pub fn plays(&self) -> Vec<PlayRecord> {
        lock(&self.shared.playback).plays.clone()
    }
}

impl AudioDevice for SimulatedAudioDevice {
    fn open(&self) -> Result<Arc<dyn OutputHandle>, AudioError> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("simulated device offline".to_string()));
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimulatedOutput { shared: Arc::clone(&self.shared) }))
    }

    fn name(&self) -> String {
        "Simulated output".to_string()
    }
}

struct SimulatedOutput {
    shared: Arc<Shared>,
}

impl OutputHandle for SimulatedOutput {
    fn play(&self, buffer: Arc<SamplesBuffer>, speed: f32) -> Result<PlaybackCompletion, AudioError> {
        if self.shared.fail_play.load(Ordering::SeqCst) {
            return Err(AudioError::PlaybackFailed("simulated output rejected the buffer".to_string()));
        }

        let duration = buffer.duration_at(speed);
        let (signal, completion) = completion_pair();

        let mut playback = lock(&self.shared.playback);
        let id = playback.next_id;
        playback.next_id += 1;
        playback.plays.push(PlayRecord { speed, duration, sample_count: buffer.samples.len() });

        let shared = Arc::clone(&self.shared);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut playback = lock(&shared.playback);
            if let Some(pos) = playback.sources.iter().position(|s| s.id == id) {
                let mut source = playback.sources.remove(pos);
                source.signal.complete(PlaybackOutcome::Completed);
            }
        });

        playback.sources.push(Source { id, signal, timer });
        playback.max_concurrent = playback.max_concurrent.max(playback.sources.len());
        Ok(completion)
    }

    fn stop(&self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        let mut playback = lock(&self.shared.playback);
        for mut source in playback.sources.drain(..) {
            source.timer.abort();
            source.signal.complete(PlaybackOutcome::Interrupted);
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("simulated device offline".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_sources_are_counted() {
        let device = SimulatedAudioDevice::new();
        let output = device.open().unwrap();
        let buffer = Arc::new(SamplesBuffer::new(vec![0.0; 1000], 1000));

        let first = output.play(Arc::clone(&buffer), 1.0).unwrap();
        let second = output.play(buffer, 1.0).unwrap();
        assert_eq!(device.max_concurrent(), 2);

        output.stop();
        assert_eq!(first.wait().await, PlaybackOutcome::Interrupted);
        assert_eq!(second.wait().await, PlaybackOutcome::Interrupted);
        assert_eq!(device.active_sources(), 0);
        assert_eq!(device.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_duration_follows_speed() {
        let device = SimulatedAudioDevice::new();
        let output = device.open().unwrap();
        let buffer = Arc::new(SamplesBuffer::new(vec![0.0; 3000], 1000));

        let started = tokio::time::Instant::now();
        let outcome = output.play(buffer, 1.5).unwrap().wait().await;
        assert_eq!(outcome, PlaybackOutcome::Completed);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2010));
    }

    #[tokio::test]
    async fn test_fail_play_toggle() {
        let device = SimulatedAudioDevice::new();
        let output = device.open().unwrap();
        device.set_fail_play(true);
        let result = output.play(Arc::new(SamplesBuffer::new(vec![0.0; 10], 10)), 1.0);
        assert!(matches!(result, Err(AudioError::PlaybackFailed(_))));
    }
}
