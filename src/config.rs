//! Connection parameters and profile persistence.
//!
//! A device is addressed by a name of the form `deviceId@host[:port]`
//! (e.g. `Tracker0@localhost:3883`). [`ConnectParams`] bundles that name
//! with the optional logfile paths the engine understands and can be
//! persisted as a TOML or JSON profile.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port used when the device name does not carry one.
pub const DEFAULT_PORT: u16 = 3883;

/// Default interval between poll-loop iterations, in milliseconds.
pub const DEFAULT_POLL_PERIOD_MS: u64 = 100;

/// A malformed device name string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid device name `{input}`: expected deviceId@host[:port]")]
pub struct NameError {
    input: String,
}

/// Failure loading a [`ConnectParams`] profile from disk.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML profile: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON profile: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parsed device address: `deviceId@host[:port]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName {
    device: String,
    host: String,
    port: u16,
}

impl DeviceName {
    /// Builds a name from parts. `port` of `None` uses [`DEFAULT_PORT`].
    pub fn new(device: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            device: device.into(),
            host: host.into(),
            port: port.unwrap_or(DEFAULT_PORT),
        }
    }

    /// The device identifier (the part before `@`).
    pub fn device(&self) -> &str {
        &self.device
    }

    /// The server host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for DeviceName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NameError { input: s.to_string() };

        let (device, rest) = s.split_once('@').ok_or_else(err)?;
        if device.is_empty() || rest.is_empty() {
            return Err(err());
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| err())?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(err());
        }

        Ok(Self {
            device: device.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_PORT {
            write!(f, "{}@{}", self.device, self.host)
        } else {
            write!(f, "{}@{}:{}", self.device, self.host, self.port)
        }
    }
}

impl TryFrom<String> for DeviceName {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceName> for String {
    fn from(n: DeviceName) -> String {
        n.to_string()
    }
}

/// Everything an engine needs to open one device connection.
///
/// The four logfile fields mirror the engine's logging hooks: messages can
/// be recorded on the local side and/or requested from the remote server,
/// in each direction independently. `None` disables that log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Device address, `deviceId@host[:port]`.
    pub name: DeviceName,

    /// Local log of incoming messages.
    #[serde(default)]
    pub local_in_log: Option<String>,

    /// Local log of outgoing messages.
    #[serde(default)]
    pub local_out_log: Option<String>,

    /// Server-side log of messages it receives.
    #[serde(default)]
    pub remote_in_log: Option<String>,

    /// Server-side log of messages it sends.
    #[serde(default)]
    pub remote_out_log: Option<String>,

    /// Initial poll-loop period in milliseconds.
    #[serde(default = "default_poll_period")]
    pub poll_period_ms: u64,
}

fn default_poll_period() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

impl ConnectParams {
    /// Parameters with no logging and the default poll period.
    pub fn new(name: DeviceName) -> Self {
        Self {
            name,
            local_in_log: None,
            local_out_log: None,
            remote_in_log: None,
            remote_out_log: None,
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
        }
    }

    /// Loads a profile, dispatching on the file extension (`.json` is
    /// parsed as JSON, everything else as TOML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            Self::from_json(&text)
        } else {
            Self::from_toml(&text)
        }
    }

    /// Parses a TOML profile.
    pub fn from_toml(text: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(text)?)
    }

    /// Parses a JSON profile.
    pub fn from_json(text: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_with_explicit_port() {
        let n: DeviceName = "Tracker0@vr-host:4500".parse().unwrap();
        assert_eq!(n.device(), "Tracker0");
        assert_eq!(n.host(), "vr-host");
        assert_eq!(n.port(), 4500);
        assert_eq!(n.to_string(), "Tracker0@vr-host:4500");
    }

    #[test]
    fn parses_name_with_default_port() {
        let n: DeviceName = "Analog0@localhost".parse().unwrap();
        assert_eq!(n.port(), DEFAULT_PORT);
        assert_eq!(n.to_string(), "Analog0@localhost");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "Tracker0", "@host", "dev@", "dev@host:notaport", "dev@:80"] {
            assert!(bad.parse::<DeviceName>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn loads_toml_profile() {
        let params = ConnectParams::from_toml(
            r#"
            name = "Tracker0@localhost"
            local_in_log = "incoming.log"
            poll_period_ms = 20
            "#,
        )
        .unwrap();
        assert_eq!(params.name.device(), "Tracker0");
        assert_eq!(params.local_in_log.as_deref(), Some("incoming.log"));
        assert_eq!(params.remote_out_log, None);
        assert_eq!(params.poll_period_ms, 20);
    }

    #[test]
    fn loads_json_profile_with_defaults() {
        let params = ConnectParams::from_json(r#"{ "name": "Button0@host:3884" }"#).unwrap();
        assert_eq!(params.name.port(), 3884);
        assert_eq!(params.poll_period_ms, DEFAULT_POLL_PERIOD_MS);
    }

    #[test]
    fn name_serializes_as_string() {
        let params = ConnectParams::new("Force0@haptics".parse().unwrap());
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains(r#""name":"Force0@haptics""#));
    }
}
