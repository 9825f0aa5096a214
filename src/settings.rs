use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SETTINGS_PATH: &str = "appsettings.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub app_info: AppInfo,
    pub app_settings: AppSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppInfo {
    pub info: String,
    pub version: String,
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppSettings {
    pub polling_interval: u64,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    /// Skips reading the report descriptor when set.
    #[serde(default)]
    pub report_length: Option<usize>,
    /// hwmon-style file holding the GPU temperature in millidegrees.
    #[serde(default)]
    pub gpu_temperature_path: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VID: 0x{:04X}, PID: 0x{:04X}",
            self.vendor_id, self.product_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub identity: DeviceIdentity,
    pub debug: bool,
}

impl TryFrom<&Settings> for PollConfig {
    type Error = anyhow::Error;

    fn try_from(settings: &Settings) -> Result<Self> {
        let app_settings = &settings.app_settings;
        ensure!(
            app_settings.polling_interval > 0,
            "PollingInterval must be greater than zero"
        );

        let vendor_id = parse_hex_u16(app_settings.vendor_id.as_deref().unwrap_or_default())
            .context("Invalid VendorId")?;
        let product_id = parse_hex_u16(app_settings.product_id.as_deref().unwrap_or_default())
            .context("Invalid ProductId")?;

        Ok(Self {
            interval: Duration::from_millis(app_settings.polling_interval),
            identity: DeviceIdentity {
                vendor_id,
                product_id,
            },
            debug: settings.app_info.debug,
        })
    }
}

/// Parses a hexadecimal identifier with an optional `0x`/`0X` prefix.
/// An empty string parses to zero.
pub fn parse_hex_u16(hex: &str) -> Result<u16> {
    let hex = hex.trim();
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if digits.is_empty() {
        return Ok(0);
    }
    u16::from_str_radix(digits, 16)
        .with_context(|| format!("{hex:?} is not a 16-bit hexadecimal value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SETTINGS_JSON: &str = r#"{
        "AppInfo": { "Info": "FluxProDisplay", "Version": "1.2.0", "Debug": true },
        "AppSettings": {
            "PollingInterval": 1000,
            "VendorId": "0x2022",
            "ProductId": "0522"
        }
    }"#;

    #[test]
    fn test_parse_hex_prefixes() {
        assert_eq!(parse_hex_u16("0x2022").unwrap(), 0x2022);
        assert_eq!(parse_hex_u16("0XFFFF").unwrap(), 0xFFFF);
        assert_eq!(parse_hex_u16("0522").unwrap(), 0x0522);
        assert_eq!(parse_hex_u16("abcd").unwrap(), 0xABCD);
    }

    #[test]
    fn test_parse_hex_empty_is_zero() {
        assert_eq!(parse_hex_u16("").unwrap(), 0);
        assert_eq!(parse_hex_u16("0x").unwrap(), 0);
    }

    #[test]
    fn test_parse_hex_rejects_invalid() {
        assert!(parse_hex_u16("0x10000").is_err());
        assert!(parse_hex_u16("0xZZ").is_err());
        assert!(parse_hex_u16("-1").is_err());
    }

    #[test]
    fn test_poll_config_from_settings() {
        let settings = Settings::parse(SETTINGS_JSON).unwrap();
        let config = PollConfig::try_from(&settings).unwrap();

        assert_eq!(config.interval, Duration::from_millis(1000));
        assert_eq!(
            config.identity,
            DeviceIdentity {
                vendor_id: 0x2022,
                product_id: 0x0522
            }
        );
        assert!(config.debug);
        assert_eq!(settings.app_settings.report_length, None);
        assert_eq!(settings.app_settings.gpu_temperature_path, None);
    }

    #[test]
    fn test_missing_identifiers_and_app_info() {
        let settings = Settings::parse(r#"{ "AppSettings": { "PollingInterval": 250 } }"#).unwrap();
        let config = PollConfig::try_from(&settings).unwrap();

        assert_eq!(config.identity.to_string(), "VID: 0x0000, PID: 0x0000");
        assert!(!config.debug);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let settings = Settings::parse(r#"{ "AppSettings": { "PollingInterval": 0 } }"#).unwrap();
        assert!(PollConfig::try_from(&settings).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS_JSON.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.app_info.version, "1.2.0");
        assert_eq!(settings.app_settings.vendor_id.as_deref(), Some("0x2022"));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
