use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::QueueError;
use crate::models::{BroadcastItem, ItemKind, ItemOrigin};

/// On-disk rundown: a list of `[[items]]` tables
#[derive(Debug, Serialize, Deserialize)]
struct RundownFile {
    #[serde(default)]
    items: Vec<RundownEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RundownEntry {
    kind: ItemKind,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default = "default_origin")]
    origin: ItemOrigin,
}

fn default_origin() -> ItemOrigin {
    ItemOrigin::Manual
}

pub fn parse_rundown(content: &str) -> Result<Vec<BroadcastItem>, QueueError> {
    let file: RundownFile = toml::from_str(content)
        .map_err(|e| QueueError::InvalidRundown(e.to_string()))?;

    file.items
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.title.trim().is_empty() && entry.body.trim().is_empty() {
                return Err(QueueError::InvalidRundown(format!("item {} has no text", index + 1)));
            }
            Ok(BroadcastItem::new(entry.kind, entry.title, entry.body, entry.origin))
        })
        .collect()
}

pub fn load_rundown(path: &Path) -> Result<Vec<BroadcastItem>, QueueError> {
    let content = fs::read_to_string(path)
        .map_err(|e| QueueError::InvalidRundown(format!("{}: {}", path.display(), e)))?;
    parse_rundown(&content)
}

pub fn save_rundown(path: &Path, items: &[BroadcastItem]) -> Result<(), QueueError> {
    let file = RundownFile {
        items: items
            .iter()
            .map(|item| RundownEntry {
                kind: item.kind(),
                title: item.title().to_string(),
                body: item.body().to_string(),
                origin: item.origin(),
            })
            .collect(),
    };
    let content = toml::to_string_pretty(&file)
        .map_err(|e| QueueError::InvalidRundown(e.to_string()))?;
    fs::write(path, content)
        .map_err(|e| QueueError::InvalidRundown(format!("{}: {}", path.display(), e)))
}

/// Built-in rundown: station identifier, headline, promo
pub fn default_rundown() -> Vec<BroadcastItem> {
    vec![
        BroadcastItem::manual(
            ItemKind::StationIdentifier,
            "Station identification",
            "You are listening to the campaign radio service, the official voice of the alliance.",
        ),
        BroadcastItem::manual(
            ItemKind::News,
            "Election headlines",
            "Polling stations open at seven in the morning. Check your booth number before you leave home.",
        ),
        BroadcastItem::manual(
            ItemKind::Advertisement,
            "Campaign promo",
            "For a better tomorrow, vote for progress. Every vote counts.",
        ),
    ]
}
