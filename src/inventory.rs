// Block-device inventory.
//
// Read-only queries used by the selection and listing steps: which disks
// exist, how big they are, their hardware serials, and whether anything
// on them is currently mounted. None of this touches orchestrator state.

use crate::{DeviceId, SweepError, SweepResult};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::process::Command;

/// One enumerated disk. `serial` and `mountpoint` are whatever the
/// kernel/udev reported; virtual disks often have neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub size_bytes: u64,
    pub serial: Option<String>,
    pub mountpoint: Option<String>,
}

pub struct DeviceInventory;

impl DeviceInventory {
    /// Enumerate whole disks via lsblk. Partitions, optical drives and
    /// pseudo-devices (loop, ram, zram, device-mapper) are filtered out.
    pub fn detect() -> SweepResult<Vec<BlockDevice>> {
        let output = Command::new("lsblk")
            .args([
                "--json",
                "--bytes",
                "--nodeps",
                "-o",
                "NAME,SIZE,TYPE,SERIAL,MOUNTPOINT",
            ])
            .output()
            .map_err(|e| SweepError::Inventory(format!("failed to run lsblk: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SweepError::Inventory(format!(
                "lsblk exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let devices = Self::parse_lsblk(&String::from_utf8_lossy(&output.stdout))?;
        debug!("inventory found {} disk(s)", devices.len());
        Ok(devices)
    }

    /// Pseudo and removable-media devices that must never be offered for
    /// wiping or scanning.
    pub(crate) fn should_skip_device(device_name: &str) -> bool {
        device_name.starts_with("loop")
            || device_name.starts_with("ram")
            || device_name.starts_with("dm-")
            || device_name.starts_with("sr") // CD/DVD drives
            || device_name.starts_with("zram")
            || device_name.starts_with("fd")
            || device_name.starts_with("md")
    }

    fn parse_lsblk(json: &str) -> SweepResult<Vec<BlockDevice>> {
        let report: LsblkReport = serde_json::from_str(json)
            .map_err(|e| SweepError::Inventory(format!("unreadable lsblk output: {}", e)))?;

        let devices = report
            .blockdevices
            .into_iter()
            .filter(|d| d.device_type.as_deref() == Some("disk"))
            .filter(|d| !Self::should_skip_device(&d.name))
            .map(|d| BlockDevice {
                size_bytes: d.size.map(|s| s.as_bytes()).unwrap_or(0),
                name: d.name,
                serial: d.serial.filter(|s| !s.is_empty()),
                mountpoint: d.mountpoint.filter(|m| !m.is_empty()),
            })
            .collect();

        Ok(devices)
    }

    /// Whether the device, or any partition on it, is currently mounted.
    pub fn is_mounted(device: &DeviceId) -> SweepResult<bool> {
        let mounts = fs::read_to_string("/proc/mounts")?;
        let device_path = device.device_path();
        let prefix = device_path.to_string_lossy();

        for line in mounts.lines() {
            if let Some(source) = line.split_whitespace().next() {
                if Self::names_device_or_partition(source, prefix.as_ref()) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// True when `source` names the device itself or one of its partitions
    /// (`/dev/sda1`, `/dev/nvme0n1p2`), but not a longer sibling name such
    /// as `/dev/sdab`.
    fn names_device_or_partition(source: &str, device_path: &str) -> bool {
        match source.strip_prefix(device_path) {
            None => false,
            Some("") => true,
            Some(rest) => {
                // Partition suffixes: "1" on sda, "p1" on nvme0n1 / mmcblk0.
                let digits = rest.strip_prefix('p').unwrap_or(rest);
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    size: Option<JsonSize>,
    #[serde(rename = "type", default)]
    device_type: Option<String>,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
}

/// util-linux emits sizes as numbers since 2.37 and as strings before;
/// accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonSize {
    Number(u64),
    Text(String),
}

impl JsonSize {
    fn as_bytes(&self) -> u64 {
        match self {
            JsonSize::Number(n) => *n,
            JsonSize::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}
