pub mod audio;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_recovery;
pub mod logging;
pub mod models;
pub mod queue;
pub mod synth;


pub use audio::{AudioDevice, AudioSink, PlaybackOutcome};
pub use config::{ConfigManager, StationConfig};
pub use engine::EngineController;
pub use error::{StationError, AudioError, SynthesisError, QueueError, ConfigError, EngineError};
pub use models::{BroadcastItem, EngineState, InjectPosition, ItemId, ItemKind, StationStatus, StopReason};
pub use queue::PlayoutQueue;
pub use synth::SpeechSynthesizer;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
