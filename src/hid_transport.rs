use crate::descriptor;
use crate::helpers::retry_with_delay;
use crate::poller::{DisplayDevice, HidTransport};
use crate::settings::DeviceIdentity;
use anyhow::{Context, Result, ensure};
use hidapi::{HidApi, HidDevice};
use std::ffi::CString;
use std::time::Duration;
use tracing::{debug, info};

const MAX_INIT_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

// HID_API_MAX_REPORT_DESCRIPTOR_SIZE
const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct HidEntry {
    path: CString,
    interface_number: i32,
    product: Option<String>,
}

/// HID access through hidapi. The API context lives for the process, device
/// handles only for one tick.
pub struct HidapiTransport {
    api: HidApi,
    report_length: Option<usize>,
}

impl HidapiTransport {
    pub fn connect(report_length: Option<usize>) -> Result<Self> {
        let api = retry_with_delay(MAX_INIT_ATTEMPTS, RETRY_DELAY, || {
            HidApi::new().context("Failed to initialize HID API")
        })?;
        info!("HID API initialized");
        Ok(Self { api, report_length })
    }
}

impl HidTransport for HidapiTransport {
    type Entry = HidEntry;
    type Device = FluxProDevice;

    fn enumerate(&mut self, identity: DeviceIdentity) -> Result<Vec<HidEntry>> {
        self.api
            .refresh_devices()
            .context("Failed to refresh HID device list")?;

        Ok(self
            .api
            .device_list()
            .filter(|info| {
                info.vendor_id() == identity.vendor_id && info.product_id() == identity.product_id
            })
            .map(|info| HidEntry {
                path: info.path().to_owned(),
                interface_number: info.interface_number(),
                product: info.product_string().map(str::to_owned),
            })
            .collect())
    }

    fn open(&mut self, entry: &HidEntry) -> Result<FluxProDevice> {
        let device = self.api.open_path(&entry.path).context(format!(
            "Failed to open HID device {:?} (interface {}). Is the display connected?",
            entry.path, entry.interface_number
        ))?;

        let report_length = match self.report_length {
            Some(length) => length,
            None => read_output_report_length(&device)?,
        };

        debug!(
            product = entry.product.as_deref().unwrap_or("Flux Pro Display"),
            interface = entry.interface_number,
            report_length,
            "HID device opened"
        );

        Ok(FluxProDevice {
            device,
            report_length,
        })
    }
}

// Display Device
pub struct FluxProDevice {
    device: HidDevice,
    report_length: usize,
}

impl DisplayDevice for FluxProDevice {
    fn output_report_length(&self) -> usize {
        self.report_length
    }

    fn write(&mut self, report: &[u8]) -> Result<()> {
        let written = self
            .device
            .write(report)
            .context("Failed to write to HID device")?;
        ensure!(
            written > 0,
            "HID device accepted 0 of {} report bytes",
            report.len()
        );
        Ok(())
    }
}

fn read_output_report_length(device: &HidDevice) -> Result<usize> {
    let mut buf = [0u8; MAX_REPORT_DESCRIPTOR_SIZE];
    let size = device
        .get_report_descriptor(&mut buf)
        .context("Failed to read HID report descriptor")?;
    let length = descriptor::output_report_length(&buf[..size])
        .context("Failed to determine output report length")?;
    Ok(length)
}
