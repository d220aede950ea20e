use crate::error::{AudioError, SynthesisError};
use crate::logging::StationLogger;
use crate::models::ItemId;
use log::{info, warn};
use std::collections::HashMap;
use std::time::Duration;

/// What the playout loop does after a failure on one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Pause, then move past the item
    BackoffAndAdvance(Duration),
    /// Stop the sink and latch the station in a fatal stop
    HaltFatal,
}

impl RecoveryAction {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecoveryAction::HaltFatal)
    }
}

/// Failure classification for one station's playout loop.
///
/// Failures are absorbed here and never escape the loop, except quota
/// exhaustion which becomes `HaltFatal`. Consecutive failures are counted
/// per item so a permanently broken item shows up in the logs.
pub struct ErrorRecoveryManager {
    logger: StationLogger,
    station: String,
    backoff: Duration,
    failure_counts: HashMap<ItemId, u32>,
    warn_after: u32,
}

impl ErrorRecoveryManager {
    pub fn new(logger: StationLogger, station: impl Into<String>, backoff: Duration) -> Self {
        Self {
            logger,
            station: station.into(),
            backoff,
            failure_counts: HashMap::new(),
            warn_after: 3,
        }
    }

    pub fn on_synthesis_failure(&mut self, id: ItemId, error: &SynthesisError) -> RecoveryAction {
        match error {
            SynthesisError::QuotaExhausted => {
                self.logger.log_quota_exhausted(&self.station, id);
                RecoveryAction::HaltFatal
            }
            SynthesisError::Transient(_) | SynthesisError::Timeout(_) => {
                self.logger.log_synthesis_failed(&self.station, id, &error.to_string());
                self.record_failure(id);
                RecoveryAction::BackoffAndAdvance(self.backoff)
            }
        }
    }

    /// Playback errors are treated like transient synthesis failures
    pub fn on_playback_failure(&mut self, id: ItemId, error: &AudioError) -> RecoveryAction {
        self.logger.log_device_error(&self.station, &error.to_string());
        self.record_failure(id);
        RecoveryAction::BackoffAndAdvance(self.backoff)
    }

    pub fn on_success(&mut self, id: ItemId) {
        if let Some(previous) = self.failure_counts.remove(&id) {
            info!("[{}] Item [{}] recovered after {} failed attempt(s)", self.station, id.short(), previous);
        }
    }

    /// Forget counters for items no longer in the queue
    pub fn retain_items(&mut self, live: &[ItemId]) {
        self.failure_counts.retain(|id, _| live.contains(id));
    }

    fn record_failure(&mut self, id: ItemId) {
        let count = self.failure_counts.entry(id).or_insert(0);
        *count += 1;
        if *count == self.warn_after {
            warn!(
                "[{}] Item [{}] has failed {} times in a row; it is skipped on every pass",
                self.station, id.short(), count
            );
        }
    }
}
