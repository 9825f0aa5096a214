use crate::poller::SensorSource;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use systemstat::{Platform, System};
use tracing::{debug, info};

/// Reads the CPU package temperature through systemstat and, when configured,
/// the GPU temperature from an hwmon-style `temp*_input` file.
pub struct SensorReader {
    system: System,
    gpu_temperature_path: Option<PathBuf>,
}

impl SensorReader {
    pub fn new(gpu_temperature_path: Option<PathBuf>) -> Self {
        match &gpu_temperature_path {
            Some(path) => info!(path = %path.display(), "reading GPU temperature from file"),
            None => info!("no GPU temperature source configured, sending 0.0"),
        }
        Self {
            system: System::new(),
            gpu_temperature_path,
        }
    }
}

impl SensorSource for SensorReader {
    fn cpu_temperature(&mut self) -> Option<f32> {
        match self.system.cpu_temp() {
            Ok(celsius) => Some(celsius),
            Err(err) => {
                debug!(?err, "failed to read CPU temperature");
                None
            }
        }
    }

    fn gpu_temperature(&mut self) -> Option<f32> {
        let path = self.gpu_temperature_path.as_deref()?;
        match read_millidegrees(path) {
            Ok(celsius) => Some(celsius),
            Err(err) => {
                debug!(?err, "failed to read GPU temperature");
                None
            }
        }
    }
}

fn read_millidegrees(path: &Path) -> Result<f32> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let millidegrees: f32 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid temperature {:?} in {}", raw.trim(), path.display()))?;
    Ok(millidegrees / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_gpu_temperature_from_millidegrees() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "45600").unwrap();

        let mut reader = SensorReader::new(Some(file.path().to_path_buf()));
        assert_eq!(reader.gpu_temperature(), Some(45.6));
    }

    #[test]
    fn test_gpu_temperature_unconfigured() {
        let mut reader = SensorReader::new(None);
        assert_eq!(reader.gpu_temperature(), None);
    }

    #[test]
    fn test_gpu_temperature_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = SensorReader::new(Some(dir.path().join("temp1_input")));
        assert_eq!(reader.gpu_temperature(), None);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a number").unwrap();
        let mut reader = SensorReader::new(Some(file.path().to_path_buf()));
        assert_eq!(reader.gpu_temperature(), None);
    }
}
