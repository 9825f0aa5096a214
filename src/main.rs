mod descriptor;
mod error;
mod helpers;
mod hid_transport;
mod poller;
mod report;
mod sensor_reader;
mod settings;
mod status;

use anyhow::anyhow;
use hid_transport::HidapiTransport;
use poller::DevicePoller;
use sensor_reader::SensorReader;
use settings::{DEFAULT_SETTINGS_PATH, PollConfig, Settings};
use status::{StatusBoard, status_channel};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use tracing::{Level, info};

fn main() -> anyhow::Result<()> {
    let settings_path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = Settings::load(&settings_path)?;
    let config = PollConfig::try_from(&settings)?;

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();
    info!(
        app = %settings.app_info.info,
        version = %settings.app_info.version,
        debug = config.debug,
        "settings loaded from {}",
        settings_path.display()
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
    #[cfg(windows)]
    signal_hook::flag::register(signal_hook::consts::SIGBREAK, shutdown.clone())?;

    let sensors = SensorReader::new(settings.app_settings.gpu_temperature_path);
    let transport = HidapiTransport::connect(settings.app_settings.report_length)?;

    let (publisher, events) = status_channel();
    let status = thread::Builder::new()
        .name("status".to_string())
        .spawn(move || StatusBoard::default().follow(events))?;

    let mut poller = DevicePoller::new(config, sensors, transport, publisher);
    poller.run(&shutdown);
    info!(
        state = ?poller.state(),
        temperatures = ?poller.last_temperatures(),
        "poller stopped"
    );
    // Dropping the poller closes the status channel.
    drop(poller);

    let board = status
        .join()
        .map_err(|_| anyhow!("status thread panicked"))?;
    info!(status = ?board, "display status at shutdown");

    Ok(())
}
