// Device identity
// A stable 32-bit id for this machine plus the display name sent during the handshake

use std::fs;

use tracing::debug;

use super::handshake::{current_millis, LocalIdentity};

/// Our identity for every session in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: i32,
    pub name: String,
}

impl DeviceIdentity {
    /// Computes the id from the host name, or from the clock when no host name is available.
    pub fn detect(name: impl Into<String>) -> Self {
        let source = hardware_string().unwrap_or_else(|| current_millis().to_string());
        let id = id_from_string(&source);
        debug!("Device id {} derived from {:?}", id, source);
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn as_local(&self) -> LocalIdentity<'_> {
        LocalIdentity {
            id: self.id,
            name: &self.name,
        }
    }
}

/// Display name used when none is configured.
pub fn default_name() -> String {
    hardware_string().unwrap_or_else(|| "Player".to_string())
}

fn hardware_string() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Rolling hash over UTF-16 units, last to first: shift left, xor the unit,
/// xor the bit that fell off the top.
pub fn id_from_string(s: &str) -> i32 {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut res: u32 = 0;
    for &unit in units.iter().rev() {
        let overflow = res >> 31;
        res = ((res << 1) ^ unit as u32) ^ overflow;
    }
    res as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_string_known_values() {
        assert_eq!(id_from_string(""), 0);
        assert_eq!(id_from_string("A"), 65);
        assert_eq!(id_from_string("AB"), 197);
    }

    #[test]
    fn test_id_wraps_without_panicking() {
        let long = "z".repeat(200);
        let id = id_from_string(&long);
        assert_eq!(id, id_from_string(&long));
        assert_ne!(id, id_from_string(&"y".repeat(200)));
    }

    #[test]
    fn test_detect_keeps_name() {
        let identity = DeviceIdentity::detect("alice");
        assert_eq!(identity.name, "alice");
        assert_eq!(identity.as_local().id, identity.id);
    }
}
