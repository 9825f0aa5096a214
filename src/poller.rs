use crate::error::{PollError, Sensor};
use crate::report::{self, DisplayReport};
use crate::settings::{DeviceIdentity, PollConfig};
use anyhow::Result;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

/// Best-effort current temperatures in degrees Celsius.
pub trait SensorSource {
    fn cpu_temperature(&mut self) -> Option<f32>;
    fn gpu_temperature(&mut self) -> Option<f32>;
}

pub trait HidTransport {
    type Entry: Debug;
    type Device: DisplayDevice;

    /// Lists the devices matching `identity`, in enumeration order.
    fn enumerate(&mut self, identity: DeviceIdentity) -> Result<Vec<Self::Entry>>;

    /// Opens a device for a single tick. The handle is dropped once the tick ends.
    fn open(&mut self, entry: &Self::Entry) -> Result<Self::Device>;
}

pub trait DisplayDevice {
    fn output_report_length(&self) -> usize;
    fn write(&mut self, report: &[u8]) -> Result<()>;
}

/// Receives the outcome of every tick. Called from the polling thread, so
/// implementations must not block.
pub trait StateObserver {
    fn on_state_changed(&mut self, state: ConnectionState);
    fn on_debug_temperatures(&mut self, cpu: f32, gpu: f32);
    fn on_fault(&mut self, _fault: &PollError) {}
}

pub struct DevicePoller<S, T, O> {
    config: PollConfig,
    sensors: S,
    transport: T,
    observer: O,
    state: ConnectionState,
    published: Option<ConnectionState>,
    last_temperatures: Option<(f32, f32)>,
}

impl<S, T, O> DevicePoller<S, T, O>
where
    S: SensorSource,
    T: HidTransport,
    O: StateObserver,
{
    pub fn new(config: PollConfig, sensors: S, transport: T, observer: O) -> Self {
        Self {
            config,
            sensors,
            transport,
            observer,
            state: ConnectionState::Disconnected,
            published: None,
            last_temperatures: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Rounded temperatures from the latest tick that read the sensors.
    pub fn last_temperatures(&self) -> Option<(f32, f32)> {
        self.last_temperatures
    }

    /// Ticks until `shutdown` is raised. Shutdown is only observed between ticks.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(
            device = %self.config.identity,
            interval_ms = self.config.interval.as_millis() as u64,
            "starting display update loop"
        );
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();
            self.wait(shutdown);
        }
        info!("stopping display update loop");
    }

    /// One enumerate, read, encode, write, notify cycle.
    pub fn tick(&mut self) -> ConnectionState {
        let entry = self.find_device();

        let readings = if entry.is_some() || self.config.debug {
            Some(self.read_sensors())
        } else {
            None
        };

        self.state = match (&entry, readings) {
            (Some(entry), Some((cpu, gpu))) => match self.write_report(entry, cpu, gpu) {
                Ok(report) => {
                    debug!(
                        cpu = report.frame().cpu.value(),
                        gpu = report.frame().gpu.value(),
                        checksum = report.frame().checksum,
                        length = report.len(),
                        "wrote display report"
                    );
                    ConnectionState::Connected
                }
                Err(err) => {
                    self.fault(err);
                    ConnectionState::Disconnected
                }
            },
            _ => ConnectionState::Disconnected,
        };

        self.publish_state();

        if let Some((cpu, gpu)) = readings {
            let rounded = (
                report::round_to_tenths(cpu.unwrap_or(0.0)),
                report::round_to_tenths(gpu.unwrap_or(0.0)),
            );
            self.last_temperatures = Some(rounded);
            if self.config.debug {
                self.observer.on_debug_temperatures(rounded.0, rounded.1);
            }
        }

        self.state
    }

    fn find_device(&mut self) -> Option<T::Entry> {
        let identity = self.config.identity;
        let entries = match self.transport.enumerate(identity) {
            Ok(entries) => entries,
            Err(err) => {
                self.fault(PollError::EnumerationFailed(err));
                return None;
            }
        };

        if entries.len() > 1 {
            debug!(
                matches = entries.len(),
                "multiple displays matched, using the first enumerated"
            );
        }

        let entry = entries.into_iter().next();
        if entry.is_none() {
            debug!("{}", PollError::DeviceNotFound(identity));
        }
        entry
    }

    fn read_sensors(&mut self) -> (Option<f32>, Option<f32>) {
        let cpu = self.sensors.cpu_temperature();
        let gpu = self.sensors.gpu_temperature();
        if cpu.is_none() {
            self.fault(PollError::SensorUnavailable(Sensor::Cpu));
        }
        if gpu.is_none() {
            self.fault(PollError::SensorUnavailable(Sensor::Gpu));
        }
        (cpu, gpu)
    }

    fn write_report(
        &mut self,
        entry: &T::Entry,
        cpu: Option<f32>,
        gpu: Option<f32>,
    ) -> Result<DisplayReport, PollError> {
        let mut device = self
            .transport
            .open(entry)
            .map_err(PollError::DeviceWriteFailed)?;
        let report = report::encode(device.output_report_length(), cpu, gpu)?;
        device
            .write(report.as_bytes())
            .map_err(PollError::DeviceWriteFailed)?;
        Ok(report)
    }

    fn fault(&mut self, fault: PollError) {
        match &fault {
            PollError::SensorUnavailable(_) | PollError::DeviceNotFound(_) => {
                debug!("{fault}")
            }
            _ => warn!(err = %fault, "display update failed, retrying next tick"),
        }
        self.observer.on_fault(&fault);
    }

    fn publish_state(&mut self) {
        if self.published != Some(self.state) {
            info!(state = ?self.state, "display connection state changed");
            self.observer.on_state_changed(self.state);
            self.published = Some(self.state);
        }
    }

    fn wait(&self, shutdown: &AtomicBool) {
        let deadline = Instant::now() + self.config.interval;
        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep((deadline - now).min(SHUTDOWN_CHECK_INTERVAL));
        }
    }
}
