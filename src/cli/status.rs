use std::time::Duration;
use crate::error::{ErrorSeverity, StationError};
use crate::logging::{EventStatistics, StationEvent};
use crate::models::{BroadcastItem, EngineState, StationStatus};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Full station panel: state, current item, up next
    pub fn display_full_status(
        station: &str,
        status: &StationStatus,
        current: Option<&BroadcastItem>,
        upcoming: &[BroadcastItem],
        device: &str,
    ) {
        println!("┌─ Station '{}' ──────────────────────────────────────────┐", Self::truncate(station, 12));
        println!("│ {}", Self::format_state(status));
        if status.needs_attention() {
            println!("│ !! Needs attention: synthesis quota exhausted. Type 'ack' after fixing it.");
        }

        println!("│");
        match current {
            Some(item) => {
                let slot = status.current_index.map_or("-".to_string(), |i| (i + 1).to_string());
                println!("│ On air: [{}] {} ({})", slot, Self::truncate(&item.display_name(), 40), item.kind().as_str());
            }
            None => println!("│ On air: nothing"),
        }

        if !upcoming.is_empty() {
            println!("│ Up next:");
            for item in upcoming {
                println!("│   • {}", Self::truncate(&item.display_name(), 48));
            }
        }

        println!("│");
        println!("│ Speed: {:.2}x | Rundown: {} items", status.speed, status.queue_len);
        println!("│ Device: {}", Self::truncate(device, 49));
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// One-line status
    pub fn format_compact_status(status: &StationStatus, current: Option<&BroadcastItem>) -> String {
        let on_air = current.map_or("-".to_string(), |item| Self::truncate(&item.display_name(), 30));
        format!("{} | {} | {:.2}x | {} items", Self::format_state(status), on_air, status.speed, status.queue_len)
    }

    pub fn display_queue(items: &[BroadcastItem], current_index: Option<usize>) {
        if items.is_empty() {
            println!("Rundown is empty");
            return;
        }
        println!("Rundown ({} items):", items.len());
        for line in Self::queue_lines(items, current_index) {
            println!("{}", line);
        }
    }

    pub fn queue_lines(items: &[BroadcastItem], current_index: Option<usize>) -> Vec<String> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let marker = if Some(i) == current_index { ">" } else { " " };
                format!("{} {:>2}: [{:<9}] {}", marker, i + 1, item.kind().as_str(),
                    Self::truncate(&item.display_name(), 50))
            })
            .collect()
    }

    pub fn display_events(events: &[StationEvent], stats: &EventStatistics) {
        if events.is_empty() {
            println!("No station events yet");
            return;
        }
        for event in events {
            let duration = event
                .duration
                .map(|d| format!(" ({})", Self::format_duration(d)))
                .unwrap_or_default();
            println!("{} [{}] {}{}",
                event.timestamp.format("%H:%M:%S"),
                event.event_type.as_str(),
                event.details,
                duration
            );
        }
        println!("-- {} started, {} completed, {} interrupted, {} synthesis failures",
            stats.items_started, stats.items_completed, stats.items_interrupted, stats.synthesis_failures);
    }

    pub fn format_state(status: &StationStatus) -> String {
        match status.state {
            EngineState::Playing => "● On air".to_string(),
            EngineState::Connecting => "◌ Connecting".to_string(),
            EngineState::StoppingRequested => "◌ Stopping".to_string(),
            EngineState::Idle => "○ Idle".to_string(),
            EngineState::Stopped if status.needs_attention() => "✗ Stopped (fatal)".to_string(),
            EngineState::Stopped => "○ Stopped".to_string(),
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &StationError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &StationError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());
        if let Some(first) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", first);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Format duration as MM:SS, or HH:MM:SS past the hour
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate to `max_len` characters with an ellipsis
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemId, ItemKind, StopReason};

    fn create_test_status(state: EngineState) -> StationStatus {
        StationStatus {
            state,
            stop_reason: None,
            current_item_id: Some(ItemId::new()),
            current_index: Some(1),
            speed: 1.25,
            queue_len: 3,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(30)), "00:30");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(90)), "01:30");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(StatusDisplay::truncate("short", 10), "short");
        assert_eq!(StatusDisplay::truncate("a much longer headline", 10), "a much ...");
        assert_eq!(StatusDisplay::truncate("résumé électoral", 8), "résum...");
        assert_eq!(StatusDisplay::truncate("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_wrap_text() {
        let lines = StatusDisplay::wrap_text("one two three four five", 10);
        assert_eq!(lines, vec!["one two", "three four", "five"]);
        assert!(StatusDisplay::wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_format_state() {
        assert_eq!(StatusDisplay::format_state(&create_test_status(EngineState::Playing)), "● On air");

        let mut fatal = create_test_status(EngineState::Stopped);
        fatal.stop_reason = Some(StopReason::Fatal);
        assert_eq!(StatusDisplay::format_state(&fatal), "✗ Stopped (fatal)");

        fatal.stop_reason = Some(StopReason::UserRequested);
        assert_eq!(StatusDisplay::format_state(&fatal), "○ Stopped");
    }

    #[test]
    fn test_compact_status() {
        let item = BroadcastItem::manual(ItemKind::News, "Headlines", "body");
        let line = StatusDisplay::format_compact_status(&create_test_status(EngineState::Playing), Some(&item));
        assert_eq!(line, "● On air | Headlines | 1.25x | 3 items");
    }

    #[test]
    fn test_queue_lines_mark_current() {
        let items = vec![
            BroadcastItem::manual(ItemKind::StationIdentifier, "ID", ""),
            BroadcastItem::manual(ItemKind::News, "Headlines", "body"),
        ];
        let lines = StatusDisplay::queue_lines(&items, Some(1));
        assert!(lines[0].starts_with("   1:"));
        assert!(lines[1].starts_with(">  2:"));
        assert!(lines[1].contains("Headlines"));
    }
}
