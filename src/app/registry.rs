use chrono::{DateTime, Utc};

use crate::app::models::Device;

/// Current device inventory. Replaced wholesale on each successful scan so
/// readers never observe a half-updated list.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    scanned_at: Option<DateTime<Utc>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, devices: Vec<Device>) {
        self.devices = merge_duplicates(devices);
        self.scanned_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub fn scanned_at(&self) -> Option<DateTime<Utc>> {
        self.scanned_at
    }

    pub fn find(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == id)
    }
}

/// A physical device reached over USB and wirelessly at the same time shows
/// up twice. Entries merge only when both resolved the same model name and
/// one id is a prefix of the other (wired serial vs `serial:port`); the
/// shorter wired id survives and keeps the wireless flag. Anything less
/// certain stays distinct.
pub fn merge_duplicates(devices: Vec<Device>) -> Vec<Device> {
    let mut merged: Vec<Device> = Vec::with_capacity(devices.len());
    for candidate in devices {
        let duplicate = merged.iter_mut().find(|existing| {
            existing.model_resolved()
                && candidate.model_resolved()
                && existing.model == candidate.model
                && (candidate.id.starts_with(existing.id.as_str())
                    || existing.id.starts_with(candidate.id.as_str()))
        });
        match duplicate {
            Some(existing) => {
                let wireless = existing.wireless_connected || candidate.wireless_connected;
                if candidate.id.len() < existing.id.len() {
                    existing.id = candidate.id;
                }
                existing.wireless_connected = wireless;
            }
            None => merged.push(candidate),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::AuthStatus;

    #[test]
    fn replaces_inventory_wholesale() {
        let mut registry = DeviceRegistry::new();
        registry.replace(vec![Device::new("A", AuthStatus::Authorized)]);
        assert_eq!(registry.snapshot().len(), 1);
        assert!(registry.scanned_at().is_some());

        registry.replace(Vec::new());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn merges_wired_and_wireless_entries_with_same_model() {
        let wired = Device::new("ABC123", AuthStatus::Authorized).with_model("Pixel 7");
        let wireless = Device::new("ABC123:5555", AuthStatus::Authorized).with_model("Pixel 7");
        let merged = merge_duplicates(vec![wired, wireless]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "ABC123");
        assert!(merged[0].wireless_connected);
    }

    #[test]
    fn keeps_distinct_models_separate() {
        let first = Device::new("ABC123", AuthStatus::Authorized).with_model("Pixel 7");
        let second = Device::new("ABC123:5555", AuthStatus::Authorized).with_model("Pixel 8");
        assert_eq!(merge_duplicates(vec![first, second]).len(), 2);
    }

    #[test]
    fn unresolved_models_never_merge() {
        // Both ids are prefix-compatible but neither resolved a model.
        let first = Device::new("ABC123", AuthStatus::Authorized);
        let second = Device::new("ABC123:5555", AuthStatus::Authorized);
        assert_eq!(merge_duplicates(vec![first, second]).len(), 2);
    }
}
