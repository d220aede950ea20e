//! Speech synthesis seam.
//!
//! The playout engine only depends on [`SpeechSynthesizer`]. Real backends
//! live outside this crate; [`ToneSynthesizer`] is an offline stand-in for
//! the demo binary and [`TimedSynthesizer`] bounds any backend's wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use log::debug;
use crate::error::SynthesisError;
use crate::models::SamplesBuffer;

#[cfg(test)]
pub mod scripted;

/// Remote speech generation
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Fails with `Transient` for retryable problems and `QuotaExhausted`
    /// when the backend refuses further work
    async fn synthesize(&self, text: &str) -> Result<SamplesBuffer, SynthesisError>;
}

/// Wraps a backend with a bounded wait; an expired wait is a `Timeout`
pub struct TimedSynthesizer {
    inner: Arc<dyn SpeechSynthesizer>,
    timeout: Duration,
}

impl TimedSynthesizer {
    pub fn new(inner: Arc<dyn SpeechSynthesizer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl SpeechSynthesizer for TimedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SamplesBuffer, SynthesisError> {
        match tokio::time::timeout(self.timeout, self.inner.synthesize(text)).await {
            Ok(result) => result,
            Err(_) => Err(SynthesisError::Timeout(self.timeout)),
        }
    }
}

/// Offline backend that renders one short tone per word
pub struct ToneSynthesizer {
    sample_rate: u32,
    word_duration: Duration,
    gap_duration: Duration,
    /// Remaining calls before quota exhaustion; `usize::MAX` means unlimited
    quota: AtomicUsize,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(24_000)
    }
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            word_duration: Duration::from_millis(180),
            gap_duration: Duration::from_millis(60),
            quota: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn with_quota(self, calls: usize) -> Self {
        self.quota.store(calls, Ordering::SeqCst);
        self
    }

    pub fn reset_quota(&self, calls: Option<usize>) {
        self.quota.store(calls.unwrap_or(usize::MAX), Ordering::SeqCst);
    }

    fn take_quota(&self) -> Result<(), SynthesisError> {
        self.quota
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .map(|_| ())
            .map_err(|_| SynthesisError::QuotaExhausted)
    }

    /// Pitch derived from the word so the same text always sounds the same
    fn word_frequency(word: &str) -> f32 {
        let hash = word.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        180.0 + (hash % 160) as f32
    }

    pub fn render(&self, text: &str) -> SamplesBuffer {
        let rate = self.sample_rate as f32;
        let word_len = (self.word_duration.as_secs_f32() * rate) as usize;
        let gap_len = (self.gap_duration.as_secs_f32() * rate) as usize;
        let mut samples = Vec::new();

        for word in text.split_whitespace() {
            let freq = Self::word_frequency(word);
            samples.extend((0..word_len).map(|n| {
                let t = n as f32 / rate;
                // short fade at both ends avoids clicks
                let envelope = (n.min(word_len - n) as f32 / (rate * 0.01)).min(1.0);
                0.2 * envelope * (2.0 * std::f32::consts::PI * freq * t).sin()
            }));
            samples.extend(std::iter::repeat(0.0).take(gap_len));
        }

        SamplesBuffer::new(samples, self.sample_rate)
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SamplesBuffer, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::Transient("nothing to say".to_string()));
        }
        self.take_quota()?;

        let buffer = self.render(text);
        debug!("Rendered {} words into {:.2}s of audio",
            text.split_whitespace().count(), buffer.duration().as_secs_f64());
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::scripted::{Behavior, ScriptedSynthesizer};

    #[tokio::test]
    async fn test_tone_synthesizer_length() {
        let synth = ToneSynthesizer::new(1_000);
        let buffer = synth.synthesize("three short words").await.unwrap();
        assert_eq!(buffer.sample_rate, 1_000);
        assert_eq!(buffer.samples.len(), 3 * (180 + 60));
        assert!(buffer.samples.iter().all(|s| s.abs() <= 0.2));
    }

    #[tokio::test]
    async fn test_tone_synthesizer_rejects_empty_text() {
        let synth = ToneSynthesizer::default();
        let err = synth.synthesize("   ").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_tone_synthesizer_quota() {
        let synth = ToneSynthesizer::new(1_000).with_quota(2);
        assert!(synth.synthesize("one").await.is_ok());
        assert!(synth.synthesize("two").await.is_ok());
        assert_eq!(synth.synthesize("three").await.unwrap_err(), SynthesisError::QuotaExhausted);

        synth.reset_quota(None);
        assert!(synth.synthesize("four").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_synthesizer_times_out() {
        let scripted = Arc::new(ScriptedSynthesizer::new());
        scripted.set_behavior("slow", Behavior::Hang);
        let timed = TimedSynthesizer::new(scripted, Duration::from_secs(15));

        let err = timed.synthesize("slow. body").await.unwrap_err();
        assert_eq!(err, SynthesisError::Timeout(Duration::from_secs(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_synthesizer_passes_through() {
        let scripted = Arc::new(ScriptedSynthesizer::new());
        scripted.set_behavior("quota", Behavior::QuotaExhausted);
        let timed = TimedSynthesizer::new(scripted, Duration::from_secs(15));

        assert!(timed.synthesize("fine. body").await.is_ok());
        assert_eq!(timed.synthesize("quota. body").await.unwrap_err(), SynthesisError::QuotaExhausted);
    }
}
