use std::collections::{HashMap, HashSet};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Read-only credential registry, loaded once at startup.
///
/// Holds the per-device shared secrets checked when a reader connects and
/// the two kinds of authorized tag entries: plain allow-listed UIDs and
/// salted Argon2 hashes of UIDs. Device ids and allow-listed UIDs are
/// stored uppercase.
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<String, String>,
    allow_list: HashSet<String>,
    hashed_tags: Vec<String>,
}

impl Registry {
    pub fn new<D, A>(devices: D, allow_list: A, hashed_tags: Vec<String>) -> Self
    where
        D: IntoIterator<Item = (String, String)>,
        A: IntoIterator<Item = String>,
    {
        Self {
            devices: devices.into_iter().map(|(id, secret)| (normalize(&id), secret)).collect(),
            allow_list: allow_list.into_iter().map(|uid| normalize(&uid)).collect(),
            hashed_tags,
        }
    }

    /// Shared secret registered for a device
    pub fn secret_for(&self, device_id: &str) -> Option<&str> {
        self.devices.get(&normalize(device_id)).map(String::as_str)
    }

    /// Check a connecting device's credentials
    ///
    /// The device id is matched case-insensitively, the secret exactly.
    pub fn authenticate(&self, device_id: &str, secret: &str) -> DeviceSession {
        let authenticated = match self.secret_for(device_id) {
            Some(expected) => bool::from(expected.as_bytes().ct_eq(secret.as_bytes())),
            None => false,
        };

        if authenticated {
            debug!(device = %normalize(device_id), "Device authenticated");
        } else {
            warn!(device = %normalize(device_id), "Device authentication failed");
        }

        DeviceSession {
            device_id: device_id.to_string(),
            secret: secret.to_string(),
            authenticated,
        }
    }

    /// Case-insensitive exact match against the allow-list
    pub fn is_allow_listed(&self, uid: &str) -> bool {
        self.allow_list.contains(&normalize(uid))
    }

    /// Salted hash entries, in registry order
    pub fn hashed_tags(&self) -> &[String] {
        &self.hashed_tags
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn tag_count(&self) -> usize {
        self.allow_list.len() + self.hashed_tags.len()
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_uppercase()
}

/// Credentials a connection presented, and whether they were accepted
///
/// Carried as metadata on every audit record produced for the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub device_id: String,
    pub secret: String,
    pub authenticated: bool,
}
