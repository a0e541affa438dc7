use serde::{Deserialize, Serialize};

/// Marker adb appends to mDNS-advertised wireless sessions.
pub const WIRELESS_SESSION_MARKER: &str = "_adb-tls-connect";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthStatus {
    Authorized,
    Unauthorized,
    #[default]
    Unknown,
}

/// Identity and capability snapshot of one physical device at one point in
/// time. A rescan produces new values; stale snapshots are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub model: String,
    pub auth_status: AuthStatus,
    pub wireless_connected: bool,
}

impl Device {
    /// `id` must be non-empty; the model defaults to the id until resolved.
    pub fn new(id: impl Into<String>, auth_status: AuthStatus) -> Self {
        let id = id.into();
        debug_assert!(!id.is_empty(), "device id must not be empty");
        let wireless_connected = is_wireless_id(&id);
        Self {
            model: id.clone(),
            id,
            auth_status,
            wireless_connected,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_auth_status(mut self, auth_status: AuthStatus) -> Self {
        self.auth_status = auth_status;
        self
    }

    pub fn model_resolved(&self) -> bool {
        self.model != self.id
    }
}

pub fn is_wireless_id(id: &str) -> bool {
    id.contains(':') || id.contains(WIRELESS_SESSION_MARKER)
}

/// Logical on-device folders the transfer protocols address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceFolder {
    Root,
    Dcim,
    Downloads,
    Music,
    Pictures,
    Ringtones,
    Alarms,
    MessagingBackups,
    MessagingDatabase,
    MessagingMedia,
}

impl DeviceFolder {
    pub fn path(&self) -> &'static str {
        match self {
            DeviceFolder::Root => "/storage/emulated/0",
            DeviceFolder::Dcim => "/storage/emulated/0/DCIM",
            DeviceFolder::Downloads => "/storage/emulated/0/Download",
            DeviceFolder::Music => "/storage/emulated/0/Music",
            DeviceFolder::Pictures => "/storage/emulated/0/Pictures",
            DeviceFolder::Ringtones => "/storage/emulated/0/Ringtones",
            DeviceFolder::Alarms => "/storage/emulated/0/Alarms",
            DeviceFolder::MessagingBackups => {
                "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Backups"
            }
            DeviceFolder::MessagingDatabase => {
                "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Databases"
            }
            DeviceFolder::MessagingMedia => {
                "/storage/emulated/0/Android/media/com.whatsapp/WhatsApp/Media"
            }
        }
    }

    pub fn all() -> &'static [DeviceFolder] {
        &[
            DeviceFolder::Root,
            DeviceFolder::Dcim,
            DeviceFolder::Downloads,
            DeviceFolder::Music,
            DeviceFolder::Pictures,
            DeviceFolder::Ringtones,
            DeviceFolder::Alarms,
            DeviceFolder::MessagingBackups,
            DeviceFolder::MessagingDatabase,
            DeviceFolder::MessagingMedia,
        ]
    }
}

/// Outcome of one push or pull operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferReport {
    pub total: u64,
    pub skipped: u64,
    pub transferred: u64,
}

impl TransferReport {
    pub fn from_counts(total: u64, skipped: u64) -> Self {
        Self {
            total,
            skipped,
            transferred: total.saturating_sub(skipped),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PackageKind {
    All,
    System,
    ThirdParty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_model_to_id_until_resolved() {
        let device = Device::new("ABC123", AuthStatus::Unknown);
        assert_eq!(device.model, "ABC123");
        assert!(!device.model_resolved());
        let device = device.with_model("Pixel 7");
        assert_eq!(device.model, "Pixel 7");
        assert!(device.model_resolved());
    }

    #[test]
    fn derives_wireless_flag_from_id() {
        assert!(Device::new("192.168.1.20:5555", AuthStatus::Unknown).wireless_connected);
        assert!(
            Device::new("adb-XYZ-aBcDeF._adb-tls-connect._tcp", AuthStatus::Unknown)
                .wireless_connected
        );
        assert!(!Device::new("0123456789ABCDEF", AuthStatus::Unknown).wireless_connected);
    }

    #[test]
    fn blank_model_does_not_overwrite() {
        let device = Device::new("ABC", AuthStatus::Authorized).with_model("  ");
        assert_eq!(device.model, "ABC");
    }

    #[test]
    fn folder_paths_are_absolute() {
        for folder in DeviceFolder::all() {
            assert!(folder.path().starts_with("/storage/emulated/0"));
        }
    }

    #[test]
    fn transfer_report_subtracts_skipped() {
        let report = TransferReport::from_counts(10, 3);
        assert_eq!(report.transferred, 7);
        // skipped larger than total must not underflow
        assert_eq!(TransferReport::from_counts(2, 5).transferred, 0);
    }
}
