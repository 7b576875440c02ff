use serde::{Deserialize, Serialize};

/// Pseudo-identity of this client, attached to login requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub device_unique_id: String,
    pub device_name: String,
    pub device_location: String,
}
