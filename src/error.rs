use std::time::Duration;
use thiserror::Error;

/// Main station error type
#[derive(Debug, Error)]
pub enum StationError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl StationError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            StationError::Audio(err) => err.user_message(),
            StationError::Synthesis(err) => err.user_message(),
            StationError::Queue(err) => err.user_message(),
            StationError::Config(err) => err.user_message(),
            StationError::Engine(err) => err.user_message(),
            StationError::File(err) => format!("File system error: {}", err),
            StationError::Parse(err) => format!("Command error: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            StationError::Audio(err) => err.recovery_suggestions(),
            StationError::Synthesis(err) => err.recovery_suggestions(),
            StationError::Queue(err) => err.recovery_suggestions(),
            StationError::Config(err) => err.recovery_suggestions(),
            StationError::Engine(err) => err.recovery_suggestions(),
            StationError::File(_) => vec!["Check the file path and permissions".to_string()],
            StationError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            StationError::Audio(err) => err.is_recoverable(),
            StationError::Synthesis(err) => err.is_recoverable(),
            StationError::Queue(err) => err.is_recoverable(),
            StationError::Config(err) => err.is_recoverable(),
            StationError::Engine(err) => err.is_recoverable(),
            StationError::File(_) => false,
            StationError::Parse(_) => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StationError::Audio(AudioError::PlaybackFailed(_)) => ErrorSeverity::Warning,
            StationError::Audio(_) => ErrorSeverity::Error,
            StationError::Synthesis(SynthesisError::QuotaExhausted) => ErrorSeverity::Critical,
            StationError::Synthesis(_) => ErrorSeverity::Warning,
            StationError::Queue(QueueError::EmptyQueue) => ErrorSeverity::Info,
            StationError::Queue(_) => ErrorSeverity::Warning,
            StationError::Config(_) => ErrorSeverity::Warning,
            StationError::Engine(EngineError::NeedsAttention) => ErrorSeverity::Critical,
            StationError::Engine(_) => ErrorSeverity::Error,
            StationError::File(_) => ErrorSeverity::Error,
            StationError::Parse(_) => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio output errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio device is held by station '{owner}'")]
    AlreadyOwned { owner: String },

    #[error("Audio device not acquired")]
    NotAcquired,

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::DeviceUnavailable(msg) => {
                format!("The audio output could not be opened: {}", msg)
            }
            AudioError::AlreadyOwned { owner } => {
                format!("Another station ('{}') is currently on air on this output", owner)
            }
            AudioError::NotAcquired => "The audio output has not been opened yet".to_string(),
            AudioError::PlaybackFailed(msg) => format!("Audio playback interrupted: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::DeviceUnavailable(_) => vec![
                "Check that an output device is connected".to_string(),
                "Start the station again once the device is available".to_string(),
            ],
            AudioError::AlreadyOwned { .. } => vec![
                "Stop the other station before starting this one".to_string(),
            ],
            AudioError::NotAcquired => vec!["Start the station first".to_string()],
            AudioError::PlaybackFailed(_) => vec![
                "The station continues with the next item automatically".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::DeviceUnavailable(_) => true, // retry start
            AudioError::AlreadyOwned { .. } => false,
            AudioError::NotAcquired => true,
            AudioError::PlaybackFailed(_) => true,
        }
    }
}

/// Failures reported by the speech synthesis backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthesisError {
    #[error("Transient synthesis failure: {0}")]
    Transient(String),

    #[error("Synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Synthesis quota exhausted")]
    QuotaExhausted,
}

impl SynthesisError {
    pub fn user_message(&self) -> String {
        match self {
            SynthesisError::Transient(msg) => format!("Speech generation hiccup: {}", msg),
            SynthesisError::Timeout(after) => {
                format!("Speech generation did not answer within {:.1}s", after.as_secs_f64())
            }
            SynthesisError::QuotaExhausted => {
                "Speech generation quota is exhausted - the station needs attention".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            SynthesisError::Transient(_) | SynthesisError::Timeout(_) => vec![
                "No action needed - the station moves on to the next item".to_string(),
            ],
            SynthesisError::QuotaExhausted => vec![
                "Switch to credentials with remaining quota".to_string(),
                "Acknowledge the fault with 'ack', then start the station again".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SynthesisError::QuotaExhausted)
    }

    /// Transient errors and timeouts are retried on the next loop pass
    pub fn is_transient(&self) -> bool {
        matches!(self, SynthesisError::Transient(_) | SynthesisError::Timeout(_))
    }
}

/// Queue management errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Invalid index: {index}")]
    InvalidIndex { index: usize },

    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Duplicate item id: {id}")]
    DuplicateId { id: String },

    #[error("Invalid rundown: {0}")]
    InvalidRundown(String),
}

impl QueueError {
    pub fn user_message(&self) -> String {
        match self {
            QueueError::EmptyQueue => "No items in the rundown - inject some first".to_string(),
            QueueError::InvalidIndex { index } => {
                format!("Slot number {} is not valid for the current rundown", index + 1)
            }
            QueueError::ItemNotFound { id } => format!("Item {} is no longer in the rundown", id),
            QueueError::DuplicateId { id } => format!("Item {} is already in the rundown", id),
            QueueError::InvalidRundown(msg) => format!("Rundown file could not be read: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            QueueError::EmptyQueue => vec!["Use 'inject back <text>' to add an item".to_string()],
            QueueError::InvalidIndex { .. } => vec![
                "Use 'queue' to see available slots".to_string(),
                "Slot numbers start from 0".to_string(),
            ],
            QueueError::ItemNotFound { .. } => vec!["Refresh the rundown with 'queue'".to_string()],
            QueueError::DuplicateId { .. } => vec!["Edit the existing item instead".to_string()],
            QueueError::InvalidRundown(_) => vec![
                "Check the [[items]] tables in the rundown file".to_string(),
                "Run without --rundown to use the built-in rundown".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            QueueError::EmptyQueue => true,
            QueueError::InvalidIndex { .. } => false,
            QueueError::ItemNotFound { .. } => false,
            QueueError::DuplicateId { .. } => false,
            QueueError::InvalidRundown(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot access configuration file: {}", err),
            ConfigError::SerializationError(_) => "Failed to save configuration settings".to_string(),
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/station-playout/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
            ConfigError::InvalidValue { field, .. } => vec![
                format!("Correct '{}' in config.toml or remove it to use the default", field),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true // defaults are always available
    }
}

/// Station lifecycle errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Station needs attention after a fatal synthesis failure")]
    NeedsAttention,

    #[error("Station loop terminated unexpectedly: {0}")]
    LoopAborted(String),
}

impl EngineError {
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NeedsAttention => {
                "The station was halted by quota exhaustion and will not restart on its own".to_string()
            }
            EngineError::LoopAborted(msg) => format!("The playout loop ended unexpectedly: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            EngineError::NeedsAttention => vec![
                "Switch speech credentials".to_string(),
                "Acknowledge the fault with 'ack', then 'start'".to_string(),
            ],
            EngineError::LoopAborted(_) => vec!["Start the station again".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::NeedsAttention => false,
            EngineError::LoopAborted(_) => true,
        }
    }
}
