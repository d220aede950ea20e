use crate::models::InjectPosition;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod status;
pub use status::StatusDisplay;

/// Broadcast playout station CLI
#[derive(Parser)]
#[command(name = "station")]
#[command(about = "Looping speech playout station with live interjections")]
#[command(version = "0.1.0")]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Launch-time commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Put a station on air and accept interactive commands
    Run {
        /// TOML rundown with the initial items
        #[arg(long)]
        rundown: Option<PathBuf>,
        /// Play through the simulated output instead of the sound card
        #[arg(long)]
        simulate: bool,
        /// Initial playback speed
        #[arg(long)]
        speed: Option<f32>,
        /// Station name used in logs
        #[arg(long, default_value = "main")]
        station: String,
    },
    /// Write the built-in rundown to a file for editing
    Rundown {
        /// Destination path
        path: PathBuf,
    },
    /// List audio output devices
    Devices,
}

/// Commands typed at the interactive prompt
#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveCommand {
    Start { from: Option<usize> },
    Stop,
    Skip { index: usize },
    Speed { value: f32 },
    Cycle,
    Inject { position: InjectPosition, text: String },
    Announce { text: String },
    Remove { index: usize },
    Talkover { enabled: bool },
    Status,
    Queue,
    Events { count: usize },
    Acknowledge,
    Quit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse a line typed at the prompt. Slots are 1-based for the operator.
    pub fn parse_command(input: &str) -> Result<InteractiveCommand, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "start" | "play" => {
                let from = match args.get(1) {
                    Some(value) => Some(Self::parse_slot(value)?),
                    None => None,
                };
                Ok(InteractiveCommand::Start { from })
            }
            "stop" => Ok(InteractiveCommand::Stop),
            "skip" | "jump" => {
                let value = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "skip".to_string(),
                    argument: "slot".to_string(),
                })?;
                Ok(InteractiveCommand::Skip { index: Self::parse_slot(value)? })
            }
            "speed" => {
                let value = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "speed".to_string(),
                    argument: "multiplier".to_string(),
                })?;
                let value = value
                    .trim_end_matches('x')
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .ok_or_else(|| ParseError::InvalidArgument {
                        argument: "speed".to_string(),
                        value: value.to_string(),
                        expected: "positive number such as 1.25".to_string(),
                    })?;
                Ok(InteractiveCommand::Speed { value })
            }
            "cycle" => Ok(InteractiveCommand::Cycle),
            "inject" => {
                let position = match args.get(1).copied() {
                    Some("front") => InjectPosition::Front,
                    Some("back") => InjectPosition::Back,
                    Some(other) => {
                        return Err(ParseError::InvalidArgument {
                            argument: "position".to_string(),
                            value: other.to_string(),
                            expected: "front or back".to_string(),
                        })
                    }
                    None => {
                        return Err(ParseError::MissingArgument {
                            command: "inject".to_string(),
                            argument: "position".to_string(),
                        })
                    }
                };
                let text = Self::rest(&args, 2, "inject")?;
                Ok(InteractiveCommand::Inject { position, text })
            }
            "announce" | "say" => {
                let text = Self::rest(&args, 1, "announce")?;
                Ok(InteractiveCommand::Announce { text })
            }
            "remove" | "rm" => {
                let value = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                    command: "remove".to_string(),
                    argument: "slot".to_string(),
                })?;
                Ok(InteractiveCommand::Remove { index: Self::parse_slot(value)? })
            }
            "talkover" => match args.get(1).copied() {
                Some("on") => Ok(InteractiveCommand::Talkover { enabled: true }),
                Some("off") => Ok(InteractiveCommand::Talkover { enabled: false }),
                Some(other) => Err(ParseError::InvalidArgument {
                    argument: "talkover".to_string(),
                    value: other.to_string(),
                    expected: "on or off".to_string(),
                }),
                None => Err(ParseError::MissingArgument {
                    command: "talkover".to_string(),
                    argument: "on|off".to_string(),
                }),
            },
            "status" => Ok(InteractiveCommand::Status),
            "queue" | "list" => Ok(InteractiveCommand::Queue),
            "events" | "log" => {
                let count = match args.get(1) {
                    Some(value) => value.parse::<usize>().map_err(|_| ParseError::InvalidArgument {
                        argument: "count".to_string(),
                        value: value.to_string(),
                        expected: "number".to_string(),
                    })?,
                    None => 10,
                };
                Ok(InteractiveCommand::Events { count })
            }
            "ack" | "acknowledge" => Ok(InteractiveCommand::Acknowledge),
            "quit" | "exit" => Ok(InteractiveCommand::Quit),
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// 1-based slot from the operator, 0-based index for the engine
    fn parse_slot(value: &str) -> Result<usize, ParseError> {
        match value.parse::<usize>() {
            Ok(slot) if slot >= 1 => Ok(slot - 1),
            _ => Err(ParseError::InvalidArgument {
                argument: "slot".to_string(),
                value: value.to_string(),
                expected: "slot number starting at 1".to_string(),
            }),
        }
    }

    fn rest(args: &[&str], from: usize, command: &str) -> Result<String, ParseError> {
        if args.len() <= from {
            return Err(ParseError::MissingArgument {
                command: command.to_string(),
                argument: "text".to_string(),
            });
        }
        Ok(args[from..].join(" "))
    }

    /// Display help information
    pub fn display_help() {
        println!("Station Playout - Available Commands:");
        println!();
        println!("On air:");
        println!("  start [slot]            - Go on air (optionally from a slot)");
        println!("  stop                    - Go off air");
        println!("  skip <slot>             - Cut the current item and jump to a slot");
        println!("  speed <x>               - Set speed (0.5-2.0), applies from the next item");
        println!("  cycle                   - Step speed 1.0 > 1.25 > 1.5 > 1.75 > 1.0");
        println!("  talkover <on|off>       - Duck background audio while speaking");
        println!();
        println!("Rundown:");
        println!("  inject <front|back> <text> - Queue a bulletin");
        println!("  announce <text>         - Queue a bulletin and cut to it now");
        println!("  remove <slot>           - Remove an item");
        println!("  queue                   - Show the rundown");
        println!();
        println!("Information:");
        println!("  status                  - Show station status");
        println!("  events [n]              - Show the last n station events");
        println!("  ack                     - Acknowledge a fatal stop");
        println!();
        println!("General:");
        println!("  help                    - Show this help message");
        println!("  exit, quit              - Leave");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Help requested")]
    HelpRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        assert_eq!(CliApp::parse_command("start").unwrap(), InteractiveCommand::Start { from: None });
        assert_eq!(CliApp::parse_command("start 3").unwrap(), InteractiveCommand::Start { from: Some(2) });
        assert!(matches!(
            CliApp::parse_command("start 0"),
            Err(ParseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_basic_controls() {
        assert_eq!(CliApp::parse_command("stop").unwrap(), InteractiveCommand::Stop);
        assert_eq!(CliApp::parse_command("cycle").unwrap(), InteractiveCommand::Cycle);
        assert_eq!(CliApp::parse_command("  status  ").unwrap(), InteractiveCommand::Status);
        assert_eq!(CliApp::parse_command("queue").unwrap(), InteractiveCommand::Queue);
        assert_eq!(CliApp::parse_command("ack").unwrap(), InteractiveCommand::Acknowledge);
        assert_eq!(CliApp::parse_command("exit").unwrap(), InteractiveCommand::Quit);
    }

    #[test]
    fn test_parse_skip() {
        assert_eq!(CliApp::parse_command("skip 2").unwrap(), InteractiveCommand::Skip { index: 1 });
        assert!(matches!(
            CliApp::parse_command("skip"),
            Err(ParseError::MissingArgument { .. })
        ));
        assert!(matches!(
            CliApp::parse_command("skip two"),
            Err(ParseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(CliApp::parse_command("speed 1.5").unwrap(), InteractiveCommand::Speed { value: 1.5 });
        assert_eq!(CliApp::parse_command("speed 1.25x").unwrap(), InteractiveCommand::Speed { value: 1.25 });
        assert!(CliApp::parse_command("speed fast").is_err());
        assert!(CliApp::parse_command("speed -1").is_err());
        assert!(CliApp::parse_command("speed").is_err());
    }

    #[test]
    fn test_parse_inject() {
        assert_eq!(
            CliApp::parse_command("inject front Polls close at six").unwrap(),
            InteractiveCommand::Inject {
                position: InjectPosition::Front,
                text: "Polls close at six".to_string(),
            }
        );
        assert_eq!(
            CliApp::parse_command("inject back Weather update").unwrap(),
            InteractiveCommand::Inject {
                position: InjectPosition::Back,
                text: "Weather update".to_string(),
            }
        );
        assert!(matches!(
            CliApp::parse_command("inject middle text"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            CliApp::parse_command("inject front"),
            Err(ParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_announce_and_remove() {
        assert_eq!(
            CliApp::parse_command("announce Breaking news").unwrap(),
            InteractiveCommand::Announce { text: "Breaking news".to_string() }
        );
        assert!(CliApp::parse_command("announce").is_err());
        assert_eq!(CliApp::parse_command("remove 1").unwrap(), InteractiveCommand::Remove { index: 0 });
    }

    #[test]
    fn test_parse_talkover_and_events() {
        assert_eq!(CliApp::parse_command("talkover off").unwrap(), InteractiveCommand::Talkover { enabled: false });
        assert!(CliApp::parse_command("talkover maybe").is_err());
        assert_eq!(CliApp::parse_command("events").unwrap(), InteractiveCommand::Events { count: 10 });
        assert_eq!(CliApp::parse_command("events 3").unwrap(), InteractiveCommand::Events { count: 3 });
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(CliApp::parse_command(""), Err(ParseError::EmptyCommand)));
        assert!(matches!(CliApp::parse_command("help"), Err(ParseError::HelpRequested)));
        match CliApp::parse_command("rewind") {
            Err(ParseError::UnknownCommand { command }) => assert_eq!(command, "rewind"),
            other => panic!("expected UnknownCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_path() {
        let expanded = CliApp::expand_path("~/rundowns/morning.toml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("rundowns/morning.toml"));

        assert_eq!(CliApp::expand_path("/tmp/r.toml"), PathBuf::from("/tmp/r.toml"));
    }

    #[test]
    fn test_cli_run_arguments() {
        let cli = CliApp::try_parse_from(["station", "run", "--simulate", "--speed", "1.5"]).unwrap();
        match cli.command {
            Some(Commands::Run { simulate, speed, rundown, station }) => {
                assert!(simulate);
                assert_eq!(speed, Some(1.5));
                assert_eq!(rundown, None);
                assert_eq!(station, "main");
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }
}
