use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Opaque identifier of a broadcast item, stable for the item's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in log lines and the status display
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Informational tag; never affects scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    News,
    Advertisement,
    StationIdentifier,
    ConstituencyReport,
    Bulletin,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::News => "News",
            ItemKind::Advertisement => "Ad",
            ItemKind::StationIdentifier => "StationID",
            ItemKind::ConstituencyReport => "Report",
            ItemKind::Bulletin => "Bulletin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOrigin {
    Manual,
    GeneratedByAI,
}

/// One unit of spoken content.
///
/// Items are immutable once created. Edits replace an item by id, so a
/// snapshot taken by the playout loop is never affected by a later edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastItem {
    id: ItemId,
    kind: ItemKind,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
    origin: ItemOrigin,
}

impl BroadcastItem {
    pub fn new(kind: ItemKind, title: impl Into<String>, body: impl Into<String>, origin: ItemOrigin) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
            origin,
        }
    }

    /// Shorthand for a manually entered item
    pub fn manual(kind: ItemKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(kind, title, body, ItemOrigin::Manual)
    }

    /// Build the replacement for an edited item: same id, new content
    pub fn replaced(&self, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            title: title.into(),
            body: body.into(),
            created_at: self.created_at,
            origin: self.origin,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn origin(&self) -> ItemOrigin {
        self.origin
    }

    /// Text sent to the synthesizer: title and body joined by `separator`.
    /// Empty parts are dropped so no dangling separator is spoken.
    pub fn spoken_text(&self, separator: &str) -> String {
        let title = self.title.trim();
        let body = self.body.trim();
        match (title.is_empty(), body.is_empty()) {
            (false, false) => format!("{}{}{}", title, separator, body),
            (false, true) => title.to_string(),
            (true, false) => body.to_string(),
            (true, true) => String::new(),
        }
    }

    /// Title for display, falling back to the start of the body
    pub fn display_name(&self) -> String {
        if !self.title.trim().is_empty() {
            self.title.clone()
        } else {
            self.body.chars().take(40).collect()
        }
    }
}

/// Mono PCM produced by the synthesizer
#[derive(Debug, Clone, PartialEq)]
pub struct SamplesBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SamplesBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration at normal speed
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Wall-clock duration when played at `speed`
    pub fn duration_at(&self, speed: f32) -> Duration {
        if speed <= 0.0 {
            return self.duration();
        }
        Duration::from_secs_f64(self.duration().as_secs_f64() / speed as f64)
    }
}

/// Station lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Connecting,
    Playing,
    StoppingRequested,
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "Idle",
            EngineState::Connecting => "Connecting",
            EngineState::Playing => "Playing",
            EngineState::StoppingRequested => "Stopping",
            EngineState::Stopped => "Stopped",
        }
    }

    /// True while a playout loop exists or is being launched
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineState::Connecting | EngineState::Playing | EngineState::StoppingRequested
        )
    }
}

/// Why the station reached `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    UserRequested,
    /// Synthesis quota exhausted; operator action required
    Fatal,
}

/// Where an injected item lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectPosition {
    /// Front of the upcoming run: plays right after the current item
    Front,
    #[default]
    Back,
}

/// Coarse ducking signal for whatever background bed the host plays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeIntent {
    pub voice_active: bool,
    pub background_level: f32,
}

impl VolumeIntent {
    pub fn idle(background_level: f32) -> Self {
        Self {
            voice_active: false,
            background_level,
        }
    }
}

/// Snapshot handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct StationStatus {
    pub state: EngineState,
    pub stop_reason: Option<StopReason>,
    pub current_item_id: Option<ItemId>,
    pub current_index: Option<usize>,
    pub speed: f32,
    pub queue_len: usize,
}

impl StationStatus {
    /// Persistent "needs attention" indicator
    pub fn needs_attention(&self) -> bool {
        self.state == EngineState::Stopped && self.stop_reason == Some(StopReason::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ids_are_unique() {
        let a = BroadcastItem::manual(ItemKind::News, "a", "b");
        let b = BroadcastItem::manual(ItemKind::News, "a", "b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().short().len(), 8);
    }

    #[test]
    fn test_spoken_text_join() {
        let item = BroadcastItem::manual(ItemKind::News, "Headlines", "Polling starts at seven.");
        assert_eq!(item.spoken_text(". "), "Headlines. Polling starts at seven.");

        let untitled = BroadcastItem::manual(ItemKind::Bulletin, "  ", "Body only");
        assert_eq!(untitled.spoken_text(". "), "Body only");

        let empty = BroadcastItem::manual(ItemKind::Bulletin, "", "");
        assert!(empty.spoken_text(". ").is_empty());
    }

    #[test]
    fn test_replaced_keeps_identity() {
        let original = BroadcastItem::new(ItemKind::Advertisement, "Promo", "v1", ItemOrigin::GeneratedByAI);
        let edited = original.replaced("Promo", "v2");
        assert_eq!(original.id(), edited.id());
        assert_eq!(original.body(), "v1");
        assert_eq!(edited.body(), "v2");
        assert_eq!(edited.origin(), ItemOrigin::GeneratedByAI);
    }

    #[test]
    fn test_samples_duration_at_speed() {
        let buffer = SamplesBuffer::new(vec![0.0; 24_000], 24_000);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.duration_at(2.0), Duration::from_millis(500));
        assert_eq!(buffer.duration_at(0.0), Duration::from_secs(1));
        assert_eq!(SamplesBuffer::new(vec![0.0; 10], 0).duration(), Duration::ZERO);
    }

    #[test]
    fn test_engine_state_activity() {
        assert!(!EngineState::Idle.is_active());
        assert!(EngineState::Connecting.is_active());
        assert!(EngineState::Playing.is_active());
        assert!(EngineState::StoppingRequested.is_active());
        assert!(!EngineState::Stopped.is_active());
    }

    #[test]
    fn test_item_serialization() {
        let item = BroadcastItem::manual(ItemKind::StationIdentifier, "Station", "You are listening");
        let json = serde_json::to_string(&item).unwrap();
        let back: BroadcastItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }
}
