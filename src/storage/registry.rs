//! # Device roster.
//!
//! [`DeviceRegistry`] is the source of devices for every fleet operation and
//! the place battery health is written back to.
//!
//! ## Roster file format
//! One device per line, eight fields joined by `" - "`:
//! ```text
//! district - model - point - ip - id - communication - battery_ok - active
//! Norte - MB160 - Main Gate - 10.0.0.7 - 17 - TCP - True - True
//! ```
//! Booleans are written as `True`/`False` and parsed case-insensitively.
//! Lines that do not parse are skipped with a warning when listing and kept
//! verbatim when the file is rewritten.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::RegistryError;

const FIELD_SEPARATOR: &str = " - ";
const FIELD_COUNT: usize = 8;

/// Persistent device roster.
#[async_trait]
pub trait DeviceRegistry: Send + Sync + 'static {
    /// Every device in the roster, active or not.
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError>;

    /// Devices marked active.
    async fn list_active_devices(&self) -> Result<Vec<Device>, RegistryError> {
        let mut devices = self.list_devices().await?;
        devices.retain(|d| d.active);
        Ok(devices)
    }

    /// Persists the battery flag of the device with this IP.
    async fn update_battery_status(&self, ip: &str, battery_ok: bool) -> Result<(), RegistryError>;

    /// Marks every device active.
    async fn activate_all(&self) -> Result<(), RegistryError>;
}

/// Parses one roster line. `line_no` is 1-based and only used in errors.
pub fn parse_roster_line(line: &str, line_no: usize) -> Result<Device, RegistryError> {
    let malformed = |reason: String| RegistryError::Malformed {
        line: line_no,
        reason,
    };

    let parts: Vec<&str> = line.trim().split(FIELD_SEPARATOR).map(str::trim).collect();
    if parts.len() != FIELD_COUNT {
        return Err(malformed(format!(
            "expected {FIELD_COUNT} fields, found {}",
            parts.len()
        )));
    }
    if parts[3].is_empty() {
        return Err(malformed("empty ip".into()));
    }

    Ok(Device {
        district: parts[0].to_string(),
        model_name: parts[1].to_string(),
        point: parts[2].to_string(),
        ip: parts[3].to_string(),
        id: parts[4].to_string(),
        communication: parts[5].parse().map_err(malformed)?,
        battery_ok: parse_flag(parts[6]).ok_or_else(|| malformed(format!("bad battery flag `{}`", parts[6])))?,
        active: parse_flag(parts[7]).ok_or_else(|| malformed(format!("bad active flag `{}`", parts[7])))?,
    })
}

/// Renders a device as one roster line (no trailing newline).
pub fn format_roster_line(d: &Device) -> String {
    [
        d.district.as_str(),
        d.model_name.as_str(),
        d.point.as_str(),
        d.ip.as_str(),
        d.id.as_str(),
        &d.communication.to_string(),
        flag(d.battery_ok),
        flag(d.active),
    ]
    .join(FIELD_SEPARATOR)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn flag(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

/// Roster backed by a text file.
pub struct FileRegistry {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, RegistryError> {
        fs::read_to_string(&self.path)
            .await
            .map_err(|source| RegistryError::Io {
                path: self.path.clone(),
                source,
            })
    }

    async fn write(&self, content: String) -> Result<(), RegistryError> {
        fs::write(&self.path, content)
            .await
            .map_err(|source| RegistryError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Applies `edit` to every parsed device and rewrites the file.
    /// Returns how many devices `edit` reported as touched.
    async fn rewrite<F>(&self, mut edit: F) -> Result<usize, RegistryError>
    where
        F: FnMut(&mut Device) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let raw = self.read().await?;

        let mut touched = 0;
        let mut out = String::with_capacity(raw.len());
        for (idx, line) in raw.lines().enumerate() {
            match parse_roster_line(line, idx + 1) {
                Ok(mut device) => {
                    if edit(&mut device) {
                        touched += 1;
                    }
                    out.push_str(&format_roster_line(&device));
                }
                Err(_) => out.push_str(line),
            }
            out.push('\n');
        }
        self.write(out).await?;
        Ok(touched)
    }
}

#[async_trait]
impl DeviceRegistry for FileRegistry {
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
        let raw = self.read().await?;
        let mut devices = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_roster_line(line, idx + 1) {
                Ok(d) => devices.push(d),
                Err(e) => warn!(path = ?self.path, error = %e, "skipping roster line"),
            }
        }
        debug!(path = ?self.path, count = devices.len(), "roster loaded");
        Ok(devices)
    }

    async fn update_battery_status(&self, ip: &str, battery_ok: bool) -> Result<(), RegistryError> {
        let touched = self
            .rewrite(|d| {
                if d.ip == ip {
                    d.battery_ok = battery_ok;
                    true
                } else {
                    false
                }
            })
            .await?;
        if touched == 0 {
            return Err(RegistryError::UnknownDevice { ip: ip.to_string() });
        }
        Ok(())
    }

    async fn activate_all(&self) -> Result<(), RegistryError> {
        let touched = self
            .rewrite(|d| {
                d.active = true;
                true
            })
            .await?;
        debug!(path = ?self.path, count = touched, "all devices activated");
        Ok(())
    }
}

/// In-memory roster.
#[derive(Default)]
pub struct MemoryRegistry {
    devices: Mutex<Vec<Device>>,
}

impl MemoryRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
        }
    }

    /// Current state of one device.
    pub fn get(&self, ip: &str) -> Option<Device> {
        self.devices.lock().iter().find(|d| d.ip == ip).cloned()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
        Ok(self.devices.lock().clone())
    }

    async fn update_battery_status(&self, ip: &str, battery_ok: bool) -> Result<(), RegistryError> {
        let mut devices = self.devices.lock();
        let device = devices
            .iter_mut()
            .find(|d| d.ip == ip)
            .ok_or_else(|| RegistryError::UnknownDevice { ip: ip.to_string() })?;
        device.battery_ok = battery_ok;
        Ok(())
    }

    async fn activate_all(&self) -> Result<(), RegistryError> {
        for d in self.devices.lock().iter_mut() {
            d.active = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Communication;

    const ROSTER: &str = "\
Norte - MB160 - Main Gate - 10.0.0.7 - 17 - TCP - True - True
Norte - MB160 - Back Door - 10.0.0.8 - 18 - udp - true - false
this line is garbage
Sur - K40 - Office - 10.0.0.9 - 19 - TCP - False - True
";

    fn roster_file() -> (tempfile::TempDir, FileRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info_devices.txt");
        std::fs::write(&path, ROSTER).unwrap();
        (dir, FileRegistry::new(path))
    }

    #[test]
    fn test_parse_line_fields() {
        let d = parse_roster_line("Sur - K40 - Office - 10.0.0.9 - 19 - UDP - False - True", 1).unwrap();
        assert_eq!(d.district, "Sur");
        assert_eq!(d.model_name, "K40");
        assert_eq!(d.point, "Office");
        assert_eq!(d.ip, "10.0.0.9");
        assert_eq!(d.id, "19");
        assert_eq!(d.communication, Communication::Udp);
        assert!(!d.battery_ok);
        assert!(d.active);
        assert_eq!(
            format_roster_line(&d),
            "Sur - K40 - Office - 10.0.0.9 - 19 - UDP - False - True"
        );
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = parse_roster_line("Sur - K40 - 10.0.0.9", 4).unwrap_err();
        assert_eq!(err.as_label(), "registry_malformed");
        assert!(err.to_string().contains("line 4"));
    }

    #[tokio::test]
    async fn test_file_registry_skips_malformed_and_filters_active() {
        let (_dir, reg) = roster_file();
        let all = reg.list_devices().await.unwrap();
        assert_eq!(all.len(), 3);

        let active: Vec<String> = reg
            .list_active_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.ip)
            .collect();
        assert_eq!(active, vec!["10.0.0.7", "10.0.0.9"]);
    }

    #[tokio::test]
    async fn test_battery_update_is_persisted() {
        let (_dir, reg) = roster_file();
        reg.update_battery_status("10.0.0.7", false).await.unwrap();

        let d = reg
            .list_devices()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.ip == "10.0.0.7")
            .unwrap();
        assert!(!d.battery_ok);

        let raw = std::fs::read_to_string(reg.path()).unwrap();
        assert!(raw.contains("this line is garbage"));
    }

    #[tokio::test]
    async fn test_battery_update_unknown_ip() {
        let (_dir, reg) = roster_file();
        let err = reg.update_battery_status("10.9.9.9", true).await.unwrap_err();
        assert_eq!(err.as_label(), "registry_unknown_device");
    }

    #[tokio::test]
    async fn test_activate_all() {
        let (_dir, reg) = roster_file();
        reg.activate_all().await.unwrap();
        assert_eq!(reg.list_active_devices().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let reg = FileRegistry::new("/definitely/not/here/info_devices.txt");
        let err = reg.list_devices().await.unwrap_err();
        assert_eq!(err.as_label(), "registry_io");
    }

    #[tokio::test]
    async fn test_memory_registry() {
        let reg = MemoryRegistry::new(vec![
            Device::new("10.0.0.1", "MB160", "Gate"),
            Device::new("10.0.0.2", "MB160", "Door").with_active(false),
        ]);
        assert_eq!(reg.list_active_devices().await.unwrap().len(), 1);

        reg.update_battery_status("10.0.0.2", false).await.unwrap();
        assert!(!reg.get("10.0.0.2").unwrap().battery_ok);

        reg.activate_all().await.unwrap();
        assert_eq!(reg.list_active_devices().await.unwrap().len(), 2);
    }
}
