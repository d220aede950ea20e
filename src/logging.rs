use log::{info, warn, error, debug, trace};
use std::time::{Duration, Instant};
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use crate::lock;
use crate::models::{InjectPosition, ItemId, StopReason};

/// Timing figures for the playout path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMetrics {
    pub last_synthesis_time: Duration,
    pub last_airtime: Duration,
    pub device_acquire_time: Duration,
    pub total_airtime: Duration,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Station event for logging and debugging
#[derive(Debug, Clone)]
pub struct StationEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: StationEventType,
    pub station: String,
    pub item_id: Option<ItemId>,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEventType {
    StationStarted,
    StationStopped,
    ItemStarted,
    ItemCompleted,
    ItemInterrupted,
    SynthesisFailed,
    QuotaExhausted,
    QueueEmpty,
    SpeedChanged,
    ItemInjected,
    DeviceError,
    PerformanceWarning,
}

impl StationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationEventType::StationStarted => "STATION_STARTED",
            StationEventType::StationStopped => "STATION_STOPPED",
            StationEventType::ItemStarted => "ITEM_STARTED",
            StationEventType::ItemCompleted => "ITEM_COMPLETED",
            StationEventType::ItemInterrupted => "ITEM_INTERRUPTED",
            StationEventType::SynthesisFailed => "SYNTHESIS_FAILED",
            StationEventType::QuotaExhausted => "QUOTA_EXHAUSTED",
            StationEventType::QueueEmpty => "QUEUE_EMPTY",
            StationEventType::SpeedChanged => "SPEED_CHANGED",
            StationEventType::ItemInjected => "ITEM_INJECTED",
            StationEventType::DeviceError => "DEVICE_ERROR",
            StationEventType::PerformanceWarning => "PERFORMANCE_WARNING",
        }
    }
}

/// Event journal shared by every station in the process.
///
/// Besides forwarding to the `log` facade, the journal keeps the last
/// `max_events` entries so the CLI `events` command and the tests can
/// inspect what went on air and in which order.
#[derive(Clone)]
pub struct StationLogger {
    events: Arc<Mutex<VecDeque<StationEvent>>>,
    max_events: usize,
    performance_metrics: Arc<Mutex<PerformanceMetrics>>,
}

impl Default for StationLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl StationLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000,
            performance_metrics: Arc::new(Mutex::new(PerformanceMetrics::new())),
        }
    }

    /// Initialize the global logger; level comes from STATION_LOG_LEVEL
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("STATION_LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;

        info!("Station logging initialized with level: {}", log_level);
        Ok(())
    }

    pub fn log_event(
        &self,
        event_type: StationEventType,
        station: &str,
        item_id: Option<ItemId>,
        details: String,
        duration: Option<Duration>,
    ) {
        match event_type {
            StationEventType::StationStarted
            | StationEventType::StationStopped
            | StationEventType::ItemStarted
            | StationEventType::ItemInjected
            | StationEventType::SpeedChanged => {
                info!("[{}] [{}] {}", event_type.as_str(), station, details);
            }
            StationEventType::ItemCompleted
            | StationEventType::ItemInterrupted
            | StationEventType::QueueEmpty => {
                debug!("[{}] [{}] {}", event_type.as_str(), station, details);
            }
            StationEventType::SynthesisFailed | StationEventType::PerformanceWarning => {
                warn!("[{}] [{}] {} (duration: {:?})", event_type.as_str(), station, details, duration);
            }
            StationEventType::QuotaExhausted | StationEventType::DeviceError => {
                error!("[{}] [{}] {}", event_type.as_str(), station, details);
            }
        }

        let event = StationEvent {
            timestamp: Utc::now(),
            event_type,
            station: station.to_string(),
            item_id,
            duration,
            details,
        };

        let mut events = lock(&self.events);
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_station_started(&self, station: &str, from_index: usize) {
        self.log_event(
            StationEventType::StationStarted,
            station,
            None,
            format!("On air from slot {}", from_index),
            None,
        );
    }

    pub fn log_station_stopped(&self, station: &str, reason: StopReason) {
        let reason = match reason {
            StopReason::UserRequested => "operator request",
            StopReason::Fatal => "fatal synthesis failure",
        };
        self.log_event(
            StationEventType::StationStopped,
            station,
            None,
            format!("Off air: {}", reason),
            None,
        );
    }

    pub fn log_item_started(&self, station: &str, id: ItemId, title: &str, speed: f32) {
        self.log_event(
            StationEventType::ItemStarted,
            station,
            Some(id),
            format!("Now playing '{}' [{}] at {:.2}x", title, id.short(), speed),
            None,
        );
    }

    pub fn log_item_completed(&self, station: &str, id: ItemId, airtime: Duration) {
        self.log_event(
            StationEventType::ItemCompleted,
            station,
            Some(id),
            format!("Finished [{}] after {:.2}s", id.short(), airtime.as_secs_f64()),
            Some(airtime),
        );

        let mut metrics = lock(&self.performance_metrics);
        metrics.last_airtime = airtime;
        metrics.total_airtime += airtime;
    }

    pub fn log_item_interrupted(&self, station: &str, id: ItemId) {
        self.log_event(
            StationEventType::ItemInterrupted,
            station,
            Some(id),
            format!("Cut off [{}]", id.short()),
            None,
        );
    }

    pub fn log_synthesis_failed(&self, station: &str, id: ItemId, reason: &str) {
        self.log_event(
            StationEventType::SynthesisFailed,
            station,
            Some(id),
            format!("Could not voice [{}]: {}", id.short(), reason),
            None,
        );
    }

    pub fn log_quota_exhausted(&self, station: &str, id: ItemId) {
        self.log_event(
            StationEventType::QuotaExhausted,
            station,
            Some(id),
            format!("Quota exhausted while voicing [{}]; station halted", id.short()),
            None,
        );
    }

    pub fn log_queue_empty(&self, station: &str, retry_in: Duration) {
        self.log_event(
            StationEventType::QueueEmpty,
            station,
            None,
            format!("Rundown empty, checking again in {:.1}s", retry_in.as_secs_f64()),
            None,
        );
    }

    pub fn log_speed_changed(&self, station: &str, from: f32, to: f32) {
        self.log_event(
            StationEventType::SpeedChanged,
            station,
            None,
            format!("Speed {:.2}x -> {:.2}x", from, to),
            None,
        );
    }

    pub fn log_item_injected(&self, station: &str, id: ItemId, position: InjectPosition) {
        let position = match position {
            InjectPosition::Front => "front",
            InjectPosition::Back => "back",
        };
        self.log_event(
            StationEventType::ItemInjected,
            station,
            Some(id),
            format!("Injected [{}] at {}", id.short(), position),
            None,
        );
    }

    pub fn log_device_error(&self, station: &str, error: &str) {
        self.log_event(
            StationEventType::DeviceError,
            station,
            None,
            format!("Audio output error: {}", error),
            None,
        );
    }

    pub fn log_performance_warning(&self, station: &str, operation: &str, duration: Duration, threshold: Duration) {
        self.log_event(
            StationEventType::PerformanceWarning,
            station,
            None,
            format!("{} took {}ms (threshold: {}ms)",
                operation, duration.as_millis(), threshold.as_millis()),
            Some(duration),
        );
    }

    pub fn update_synthesis_metrics(&self, station: &str, synthesis_time: Duration) {
        let mut metrics = lock(&self.performance_metrics);
        metrics.last_synthesis_time = synthesis_time;

        let threshold = Duration::from_secs(5);
        if synthesis_time > threshold {
            drop(metrics);
            self.log_performance_warning(station, "Speech synthesis", synthesis_time, threshold);
        }
    }

    pub fn update_device_metrics(&self, station: &str, acquire_time: Duration) {
        let mut metrics = lock(&self.performance_metrics);
        metrics.device_acquire_time = acquire_time;

        let threshold = Duration::from_millis(500);
        if acquire_time > threshold {
            drop(metrics);
            self.log_performance_warning(station, "Device acquire", acquire_time, threshold);
        }
    }

    pub fn get_recent_events(&self, count: usize) -> Vec<StationEvent> {
        let events = lock(&self.events);
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    /// Ids of items that went on air, in order, optionally for one station
    pub fn items_started(&self, station: Option<&str>) -> Vec<ItemId> {
        lock(&self.events)
            .iter()
            .filter(|e| e.event_type == StationEventType::ItemStarted)
            .filter(|e| station.map_or(true, |s| e.station == s))
            .filter_map(|e| e.item_id)
            .collect()
    }

    pub fn count_events(&self, event_type: StationEventType) -> usize {
        lock(&self.events).iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        lock(&self.performance_metrics).clone()
    }

    pub fn clear_events(&self) {
        lock(&self.events).clear();
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = lock(&self.events);
        let mut stats = EventStatistics::default();

        for event in events.iter() {
            match event.event_type {
                StationEventType::ItemStarted => stats.items_started += 1,
                StationEventType::ItemCompleted => stats.items_completed += 1,
                StationEventType::ItemInterrupted => stats.items_interrupted += 1,
                StationEventType::SynthesisFailed => stats.synthesis_failures += 1,
                StationEventType::QuotaExhausted => stats.quota_exhaustions += 1,
                StationEventType::DeviceError => stats.device_errors += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub items_started: usize,
    pub items_completed: usize,
    pub items_interrupted: usize,
    pub synthesis_failures: usize,
    pub quota_exhaustions: usize,
    pub device_errors: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }
}
