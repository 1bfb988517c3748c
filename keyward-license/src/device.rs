//! Machine fingerprinting.
//!
//! A fingerprint is the hex SHA-256 of an application id and the
//! platform's stable machine identifier. Scoping by application id keeps
//! two products on one machine from sharing fingerprints.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

/// Attributes reported when activating this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hostname.
    pub hostname: String,
    /// Operating system (`linux`, `macos`, `windows`, ...).
    pub platform: String,
    /// CPU architecture (`x86_64`, `aarch64`, ...).
    pub arch: String,
}

impl DeviceInfo {
    /// Reads the attributes from the running system.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            hostname: host_name(),
            platform: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
        }
    }
}

/// Computes a fingerprint from an application id and hardware ids.
#[must_use]
pub fn fingerprint_from(app_id: &str, hardware_ids: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_bytes());
    for id in hardware_ids {
        hasher.update(b"|");
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Computes this machine's fingerprint for `app_id`.
///
/// Falls back to the hostname where no machine id is available, which
/// is less stable across renames.
#[must_use]
pub fn machine_fingerprint(app_id: &str) -> String {
    let machine_id = os_machine_id().unwrap_or_else(host_name);
    fingerprint_from(app_id, &[env::consts::OS, &machine_id])
}

/// Hostname for activation attributes and the fingerprint fallback.
fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The OS-assigned machine id: `IOPlatformUUID` on macOS, the systemd
/// or D-Bus machine id on Linux. `None` elsewhere, which makes the
/// fingerprint hostname-based.
fn os_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
