use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::sync::mpsc::{self, Sender};
use std::thread;
use crate::audio::{completion_pair, AudioDevice, CompletionSignal, OutputHandle, PlaybackCompletion, PlaybackOutcome, SpeedCursor};
use crate::error::AudioError;
use crate::lock;
use crate::models::SamplesBuffer;

/// Commands sent to the output thread
#[derive(Debug)]
enum OutputCommand {
    Resume,
    Shutdown,
}

/// What the output thread negotiated with the device
#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

struct ActiveSource {
    buffer: Arc<SamplesBuffer>,
    cursor: SpeedCursor,
    signal: CompletionSignal,
}

type SourceSlot = Arc<Mutex<Option<ActiveSource>>>;

/// System audio output through cpal
pub struct CpalAudioDevice {
    preferred: Option<String>,
}

impl CpalAudioDevice {
    pub fn new(preferred: Option<String>) -> Self {
        Self { preferred }
    }

    pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host.output_devices()
            .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Preferred device by name, falling back to the host default
    fn select_device(host: &Host, preferred: Option<&str>) -> Result<Device, AudioError> {
        if let Some(name) = preferred {
            let found = host.output_devices()
                .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false));
            match found {
                Some(device) => return Ok(device),
                None => warn!("Output device '{}' not found, using the default device", name),
            }
        }

        host.default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("No default output device available".to_string()))
    }

    fn build_stream(preferred: Option<&str>, slot: &SourceSlot) -> Result<(Stream, OutputInfo), AudioError> {
        let host = cpal::default_host();
        let device = Self::select_device(&host, preferred)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let default_config = device.default_output_config()
            .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to get default config: {}", e)))?;
        let sample_format = default_config.sample_format();
        let config: StreamConfig = default_config.into();

        let stream = match sample_format {
            SampleFormat::F32 => Self::create_output_stream::<f32>(&device, &config, slot)?,
            SampleFormat::I16 => Self::create_output_stream::<i16>(&device, &config, slot)?,
            SampleFormat::U16 => Self::create_output_stream::<u16>(&device, &config, slot)?,
            other => {
                return Err(AudioError::DeviceUnavailable(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream.play()
            .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to start audio stream: {}", e)))?;

        let info = OutputInfo {
            device_name,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };
        Ok((stream, info))
    }

    /// Create a typed output stream that pulls from the shared source slot
    fn create_output_stream<T>(device: &Device, config: &StreamConfig, slot: &SourceSlot) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + Send + 'static,
        T: cpal::FromSample<f32>,
    {
        let slot = Arc::clone(slot);
        let channels = (config.channels as usize).max(1);

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut source = lock(&slot);
                for frame in data.chunks_mut(channels) {
                    let value = next_frame_value(&mut source);
                    for sample in frame.iter_mut() {
                        *sample = T::from_sample(value);
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to build output stream: {}", e)))
    }
}

/// Pull one mono frame; completes and clears the source once it runs out
fn next_frame_value(slot: &mut Option<ActiveSource>) -> f32 {
    let Some(source) = slot.as_mut() else {
        return 0.0;
    };

    match source.cursor.next_sample(&source.buffer.samples) {
        Some(value) => value,
        None => {
            if let Some(mut finished) = slot.take() {
                finished.signal.complete(PlaybackOutcome::Completed);
            }
            0.0
        }
    }
}

impl AudioDevice for CpalAudioDevice {
    fn open(&self) -> Result<Arc<dyn OutputHandle>, AudioError> {
        let slot: SourceSlot = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputInfo, AudioError>>();
        let (command_tx, command_rx) = mpsc::channel::<OutputCommand>();
        let preferred = self.preferred.clone();
        let thread_slot = Arc::clone(&slot);

        // The stream is not Send, so it lives and dies on this thread
        let output_thread = thread::Builder::new()
            .name("station-output".to_string())
            .spawn(move || {
                #[cfg(target_os = "macos")]
                {
                    unsafe {
                        let thread = libc::pthread_self();
                        let mut policy: libc::c_int = 0;
                        let mut param: libc::sched_param = std::mem::zeroed();

                        if libc::pthread_getschedparam(thread, &mut policy, &mut param) == 0 {
                            param.sched_priority = 63;
                            let _ = libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param);
                        }
                    }
                }

                let (stream, info) = match Self::build_stream(preferred.as_deref(), &thread_slot) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(info));

                while let Ok(command) = command_rx.recv() {
                    match command {
                        OutputCommand::Resume => {
                            if let Err(e) = stream.play() {
                                warn!("Failed to resume audio stream: {}", e);
                            }
                        }
                        OutputCommand::Shutdown => break,
                    }
                }

                let _ = stream.pause();
                debug!("Output thread finished");
            })
            .map_err(|e| AudioError::DeviceUnavailable(format!("Failed to create output thread: {}", e)))?;

        let info = ready_rx.recv()
            .map_err(|_| AudioError::DeviceUnavailable("Output thread exited during setup".to_string()))??;
        info!("Audio output ready: {} ({} Hz, {} ch)", info.device_name, info.sample_rate, info.channels);

        Ok(Arc::new(CpalOutput {
            slot,
            info,
            commands: Mutex::new(command_tx),
            thread: Mutex::new(Some(output_thread)),
        }))
    }

    fn name(&self) -> String {
        self.preferred.clone().unwrap_or_else(|| "default output".to_string())
    }
}

struct CpalOutput {
    slot: SourceSlot,
    info: OutputInfo,
    commands: Mutex<Sender<OutputCommand>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl OutputHandle for CpalOutput {
    fn play(&self, buffer: Arc<SamplesBuffer>, speed: f32) -> Result<PlaybackCompletion, AudioError> {
        if buffer.sample_rate == 0 {
            return Err(AudioError::PlaybackFailed("buffer has no sample rate".to_string()));
        }

        let (signal, completion) = completion_pair();
        let cursor = SpeedCursor::new(buffer.sample_rate, self.info.sample_rate, speed);
        let replaced = lock(&self.slot).replace(ActiveSource { buffer, cursor, signal });

        if let Some(mut previous) = replaced {
            previous.signal.complete(PlaybackOutcome::Interrupted);
        }
        Ok(completion)
    }

    fn stop(&self) {
        if let Some(mut source) = lock(&self.slot).take() {
            source.signal.complete(PlaybackOutcome::Interrupted);
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        lock(&self.commands)
            .send(OutputCommand::Resume)
            .map_err(|_| AudioError::DeviceUnavailable("Output thread is gone".to_string()))
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
        let _ = lock(&self.commands).send(OutputCommand::Shutdown);
        if let Some(handle) = lock(&self.thread).take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(samples: Vec<f32>) -> (Option<ActiveSource>, PlaybackCompletion) {
        let (signal, completion) = completion_pair();
        let buffer = Arc::new(SamplesBuffer::new(samples, 1000));
        let cursor = SpeedCursor::new(1000, 1000, 1.0);
        (Some(ActiveSource { buffer, cursor, signal }), completion)
    }

    #[test]
    fn test_silence_without_source() {
        let mut slot = None;
        assert_eq!(next_frame_value(&mut slot), 0.0);
    }

    #[tokio::test]
    async fn test_source_completes_after_last_frame() {
        let (mut slot, completion) = source(vec![0.25, 0.5]);

        assert_eq!(next_frame_value(&mut slot), 0.25);
        assert_eq!(next_frame_value(&mut slot), 0.5);
        assert!(slot.is_some());

        assert_eq!(next_frame_value(&mut slot), 0.0);
        assert!(slot.is_none());
        assert_eq!(completion.wait().await, PlaybackOutcome::Completed);
    }

    #[test]
    fn test_device_name_defaults() {
        assert_eq!(CpalAudioDevice::new(None).name(), "default output");
        assert_eq!(CpalAudioDevice::new(Some("USB DAC".to_string())).name(), "USB DAC");
    }
}
