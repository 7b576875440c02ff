//! Device fingerprint provider.
//!
//! The id is minted once per storage profile and then read back verbatim.
//! Name and location are derived from the environment on every call and
//! degrade to "Unknown" labels instead of failing.

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

use crate::models::DeviceFingerprint;
use crate::storage::{KeyValueStore, DEVICE_ID_KEY};

pub const UNKNOWN_BROWSER: &str = "Unknown Browser";
pub const UNKNOWN_OS: &str = "Unknown OS";
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Source of the signals a fingerprint is derived from.
pub trait DeviceEnvironment: Send + Sync {
    fn user_agent(&self) -> Option<String>;
    fn timezone(&self) -> Option<String>;
}

/// Reads the host on every call.
#[derive(Debug, Clone, Default)]
pub struct SystemEnvironment {
    user_agent: Option<String>,
}

impl SystemEnvironment {
    pub fn new(user_agent: Option<String>) -> Self {
        Self { user_agent }
    }
}

impl DeviceEnvironment for SystemEnvironment {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone().or_else(|| {
            let os = match std::env::consts::OS {
                "macos" => "Macintosh; Mac OS X",
                "windows" => "Windows NT",
                "linux" => "X11; Linux",
                "android" => "Linux; Android",
                "ios" => "iPhone",
                _ => return None,
            };
            Some(format!(
                "campus-admin/{} ({})",
                env!("CARGO_PKG_VERSION"),
                os
            ))
        })
    }

    fn timezone(&self) -> Option<String> {
        if let Ok(tz) = std::env::var("TZ") {
            let tz = tz.trim_start_matches(':').trim();
            if is_iana_name(tz) {
                return Some(tz.to_string());
            }
        }
        if let Ok(raw) = std::fs::read_to_string("/etc/timezone") {
            let tz = raw.trim();
            if is_iana_name(tz) {
                return Some(tz.to_string());
            }
        }
        std::fs::read_link("/etc/localtime").ok().and_then(|target| {
            let target = target.to_string_lossy().into_owned();
            target
                .split_once("zoneinfo/")
                .map(|(_, name)| name.to_string())
                .filter(|name| is_iana_name(name))
        })
    }
}

/// Fixed signals, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
}

impl DeviceEnvironment for StaticEnvironment {
    fn user_agent(&self) -> Option<String> {
        self.user_agent.clone()
    }

    fn timezone(&self) -> Option<String> {
        self.timezone.clone()
    }
}

fn is_iana_name(name: &str) -> bool {
    name == "UTC"
        || (name.contains('/')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+')))
}

pub struct DeviceFingerprintProvider {
    storage: Arc<dyn KeyValueStore>,
    environment: Arc<dyn DeviceEnvironment>,
}

impl DeviceFingerprintProvider {
    pub fn new(storage: Arc<dyn KeyValueStore>, environment: Arc<dyn DeviceEnvironment>) -> Self {
        Self {
            storage,
            environment,
        }
    }

    /// Stored id if present, otherwise a fresh one that is persisted first.
    pub fn get_or_create_device_id(&self) -> String {
        match self.storage.get(DEVICE_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read device id: {}", e),
        }

        let id = generate_device_id();
        if let Err(e) = self.storage.set(DEVICE_ID_KEY, id.clone()) {
            tracing::warn!("Failed to persist device id: {}", e);
        } else {
            tracing::debug!(device_id = %id, "Minted device id");
        }
        id
    }

    pub fn device_name(&self) -> String {
        let ua = self.environment.user_agent().unwrap_or_default();
        format!("{} on {}", browser_family(&ua), operating_system(&ua))
    }

    pub fn device_location(&self) -> String {
        self.environment
            .timezone()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }

    pub fn fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint {
            device_unique_id: self.get_or_create_device_id(),
            device_name: self.device_name(),
            device_location: self.device_location(),
        }
    }
}

fn generate_device_id() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000);
    let entropy: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("dev-{:x}-{}", nanos, entropy.to_lowercase())
}

/// Browser family from a user-agent string. Order matters: Edge and Opera
/// also advertise Chrome, and Chrome also advertises Safari.
pub fn browser_family(user_agent: &str) -> &'static str {
    if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Firefox/") || user_agent.contains("FxiOS/") {
        "Firefox"
    } else if user_agent.contains("Chrome/") || user_agent.contains("CriOS/") {
        "Chrome"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else if user_agent.starts_with("campus-admin/") {
        "Campus Admin CLI"
    } else {
        UNKNOWN_BROWSER
    }
}

/// Operating system from a user-agent string. Mobile platforms are checked
/// first since their strings mention desktop systems too.
pub fn operating_system(user_agent: &str) -> &'static str {
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("CrOS") {
        "ChromeOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        UNKNOWN_OS
    }
}
