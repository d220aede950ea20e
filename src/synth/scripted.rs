use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::SynthesisError;
use crate::lock;
use crate::models::SamplesBuffer;
use crate::synth::SpeechSynthesizer;

/// Samples per second of scripted audio; low to keep buffers small
pub const SCRIPTED_RATE: u32 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Return audio of the given length
    Speak(Duration),
    /// Wait, then return audio of the given length
    Delayed { latency: Duration, audio: Duration },
    Transient,
    QuotaExhausted,
    /// Never answer
    Hang,
}

/// Synthesizer whose answers are scripted per title prefix
pub struct ScriptedSynthesizer {
    default: Mutex<Behavior>,
    rules: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::with_default(Behavior::Speak(Duration::from_secs(1)))
    }

    pub fn with_default(default: Behavior) -> Self {
        Self {
            default: Mutex::new(default),
            rules: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Applies to any text starting with `title`
    pub fn set_behavior(&self, title: &str, behavior: Behavior) {
        lock(&self.rules).insert(title.to_string(), behavior);
    }

    pub fn set_default(&self, behavior: Behavior) {
        *lock(&self.default) = behavior;
    }

    pub fn clear_rules(&self) {
        lock(&self.rules).clear();
    }

    /// Texts requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn behavior_for(&self, text: &str) -> Behavior {
        let rules = lock(&self.rules);
        rules
            .iter()
            .filter(|(title, _)| text.starts_with(title.as_str()))
            .max_by_key(|(title, _)| title.len())
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or_else(|| lock(&self.default).clone())
    }

    fn audio(length: Duration) -> SamplesBuffer {
        let count = (length.as_secs_f64() * SCRIPTED_RATE as f64).round() as usize;
        SamplesBuffer::new(vec![0.0; count], SCRIPTED_RATE)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SamplesBuffer, SynthesisError> {
        lock(&self.calls).push(text.to_string());

        match self.behavior_for(text) {
            Behavior::Speak(length) => Ok(Self::audio(length)),
            Behavior::Delayed { latency, audio } => {
                tokio::time::sleep(latency).await;
                Ok(Self::audio(audio))
            }
            Behavior::Transient => Err(SynthesisError::Transient("scripted failure".to_string())),
            Behavior::QuotaExhausted => Err(SynthesisError::QuotaExhausted),
            Behavior::Hang => std::future::pending().await,
        }
    }
}
