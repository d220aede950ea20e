use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use station_playout::audio::{AudioDevice, AudioSink, CpalAudioDevice, SimulatedAudioDevice};
use station_playout::cli::{CliApp, Commands, InteractiveCommand, ParseError, StatusDisplay};
use station_playout::config::ConfigManager;
use station_playout::engine::EngineController;
use station_playout::error::{QueueError, StationError};
use station_playout::logging::StationLogger;
use station_playout::models::{BroadcastItem, ItemId, ItemKind};
use station_playout::queue::{rundown, PlayoutQueue};
use station_playout::synth::ToneSynthesizer;

/// Options for putting a station on air
struct RunOptions {
    station: String,
    rundown: Option<PathBuf>,
    simulate: bool,
    speed: Option<f32>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            station: "main".to_string(),
            rundown: None,
            simulate: false,
            speed: None,
        }
    }
}

/// Main application controller that coordinates all components
pub struct AppController {
    controller: EngineController,
    config_manager: ConfigManager,
    last_on_air: Option<ItemId>,
    fault_announced: bool,
}

impl AppController {
    fn new(options: RunOptions) -> Result<Self, StationError> {
        let config_manager = ConfigManager::new()?;
        let config = config_manager.get_config().clone();
        debug!("Configuration from {}", config_manager.config_path().display());

        let items = match &options.rundown {
            Some(path) => rundown::load_rundown(&CliApp::expand_path(&path.to_string_lossy()))?,
            None => rundown::default_rundown(),
        };
        let queue = PlayoutQueue::from_items(items)?;

        let device: Arc<dyn AudioDevice> = if options.simulate {
            Arc::new(SimulatedAudioDevice::new())
        } else {
            Arc::new(CpalAudioDevice::new(config.preferred_device.clone()))
        };

        let controller = EngineController::new(
            options.station,
            AudioSink::new(device),
            Arc::new(ToneSynthesizer::default()),
            queue,
            config,
            StationLogger::new(),
        )?;
        if let Some(speed) = options.speed {
            controller.set_speed(speed);
        }

        info!("Station '{}' ready on {}", controller.station_name(), controller.device_name());

        Ok(Self {
            controller,
            config_manager,
            last_on_air: None,
            fault_announced: false,
        })
    }

    /// Execute one interactive command; `Ok(false)` means leave
    async fn execute_command(&mut self, command: InteractiveCommand) -> Result<bool, StationError> {
        match command {
            InteractiveCommand::Start { from } => {
                self.controller.start(from).await?;
                println!("OK: On air");
            }
            InteractiveCommand::Stop => {
                self.controller.stop();
                println!("OK: Going off air");
            }
            InteractiveCommand::Skip { index } => {
                self.controller.skip_to(index).await?;
                println!("OK: Skipping to slot {}", index + 1);
            }
            InteractiveCommand::Speed { value } => {
                let applied = self.controller.set_speed(value);
                println!("OK: Speed {:.2}x from the next item", applied);
            }
            InteractiveCommand::Cycle => {
                let applied = self.controller.cycle_speed();
                println!("OK: Speed {:.2}x from the next item", applied);
            }
            InteractiveCommand::Inject { position, text } => {
                let item = BroadcastItem::manual(ItemKind::Bulletin, "", text);
                self.controller.inject(item, position)?;
                println!("OK: Bulletin queued");
            }
            InteractiveCommand::Announce { text } => {
                let item = BroadcastItem::manual(ItemKind::Bulletin, "", text);
                self.controller.announce(item).await?;
                println!("OK: Announcing now");
            }
            InteractiveCommand::Remove { index } => {
                let item = self
                    .controller
                    .queue()
                    .get(index)
                    .ok_or(QueueError::InvalidIndex { index })?;
                let removed = self.controller.remove(item.id())?;
                println!("OK: Removed {}", removed.display_name());
            }
            InteractiveCommand::Talkover { enabled } => {
                self.controller.set_talkover(enabled);
                println!("OK: Talkover {}", if enabled { "on" } else { "off" });
            }
            InteractiveCommand::Status => {
                let status = self.controller.status();
                let current = status.current_index.and_then(|i| self.controller.queue().get(i));
                StatusDisplay::display_full_status(
                    self.controller.station_name(),
                    &status,
                    current.as_ref(),
                    &self.controller.upcoming(3),
                    &self.controller.device_name(),
                );
            }
            InteractiveCommand::Queue => {
                let status = self.controller.status();
                StatusDisplay::display_queue(&self.controller.queue().snapshot(), status.current_index);
            }
            InteractiveCommand::Events { count } => {
                let logger = self.controller.logger();
                StatusDisplay::display_events(&logger.get_recent_events(count), &logger.get_event_statistics());
            }
            InteractiveCommand::Acknowledge => {
                if self.controller.acknowledge_fault() {
                    self.fault_announced = false;
                    println!("OK: Fault cleared, 'start' is allowed again");
                } else {
                    println!("Nothing to acknowledge");
                }
            }
            InteractiveCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Announce item changes and fatal stops between prompts
    fn poll_station(&mut self) {
        let status = self.controller.status();

        if status.state.is_active() && status.current_item_id != self.last_on_air {
            if let Some(item) = status.current_index.and_then(|i| self.controller.queue().get(i)) {
                println!("\nOn air: {}", StatusDisplay::format_compact_status(&status, Some(&item)));
            }
            self.last_on_air = status.current_item_id;
        }

        if status.needs_attention() && !self.fault_announced {
            eprintln!("\n!! Station stopped: synthesis quota exhausted. Fix credentials, then type 'ack'.");
            self.fault_announced = true;
        }
    }

    /// Run interactive mode
    async fn run_interactive_mode(&mut self) -> Result<(), StationError> {
        println!("Station Playout v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut volume = self.controller.volume_intent();
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    match CliApp::parse_command(&line) {
                        Ok(command) => match self.execute_command(command).await {
                            Ok(true) => {}
                            Ok(false) => {
                                println!("Goodbye!");
                                break;
                            }
                            Err(e) => Self::report_error(&e),
                        },
                        Err(ParseError::HelpRequested) => CliApp::display_help(),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                }

                changed = volume.changed() => {
                    if changed.is_ok() {
                        let intent = *volume.borrow_and_update();
                        debug!("Background level {:.2} (voice {})", intent.background_level, intent.voice_active);
                    }
                }

                _ = interval.tick() => self.poll_station(),
            }
        }

        self.shutdown().await
    }

    fn report_error(error: &StationError) {
        log::log!(error.severity().log_level(), "{}", error);
        StatusDisplay::display_error(error);
    }

    /// Go off air, wait for the loop, persist the speed
    async fn shutdown(&mut self) -> Result<(), StationError> {
        println!("Shutting down...");

        if let Err(e) = self.controller.shutdown().await {
            eprintln!("Warning: Error stopping station: {}", e);
        }

        let speed = self.controller.speed();
        if let Err(e) = self.config_manager.set_default_speed(speed) {
            eprintln!("Warning: Error saving configuration: {}", e);
        }

        println!("Shutdown complete.");
        Ok(())
    }
}

fn write_rundown(path: &Path) -> Result<(), StationError> {
    rundown::save_rundown(path, &rundown::default_rundown())?;
    println!("Rundown written to {}", path.display());
    Ok(())
}

fn list_devices() -> Result<(), StationError> {
    let devices = CpalAudioDevice::list_output_devices()?;
    if devices.is_empty() {
        println!("No audio devices found");
    } else {
        println!("Available audio devices:");
        for device in devices {
            println!("  {}", device);
        }
    }
    Ok(())
}

async fn run(cli: CliApp) -> Result<(), StationError> {
    let options = match cli.command {
        Some(Commands::Rundown { path }) => return write_rundown(&CliApp::expand_path(&path.to_string_lossy())),
        Some(Commands::Devices) => return list_devices(),
        Some(Commands::Run { rundown, simulate, speed, station }) => RunOptions { station, rundown, simulate, speed },
        None => RunOptions::default(),
    };

    let mut app = AppController::new(options)?;
    app.run_interactive_mode().await
}

#[tokio::main]
async fn main() {
    if std::env::var("STATION_LOG_LEVEL").is_err() {
        std::env::set_var("STATION_LOG_LEVEL", "warn");
    }
    if let Err(e) = StationLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();
    if let Err(e) = run(cli).await {
        error!("Station failed: {}", e);
        StatusDisplay::display_simple_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
