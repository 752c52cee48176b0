//! Device connection configuration loaded from YAML

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::acquisition::AcquisitionOptions;
use crate::cola::ProtocolVariant;
use crate::cola::framing::DEFAULT_MAX_CONTROL_FRAME;
use crate::control::SessionOptions;
use crate::stream::{DEFAULT_MAX_BLOB_SIZE, StreamOptions};
use crate::types::DeviceFamily;
use crate::{Result, VisionaryError};

/// Default data port of all supported devices.
pub const DEFAULT_DATA_PORT: u16 = 2114;

/// Everything needed to reach and drive one device.
///
/// Missing keys take their defaults; unknown keys are rejected.
///
/// ```rust
/// use visionary::config::DeviceConfig;
///
/// let config = DeviceConfig::from_yaml_str(
///     "host: 10.0.0.7\nprotocol: cola_b\nfamily: VisionaryS\n",
/// )?;
/// assert_eq!(config.control_port(), 2112);
/// assert_eq!(config.data_port, 2114);
/// # Ok::<(), visionary::VisionaryError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub host: String,
    /// Defaults to the standard port of `protocol`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_port: Option<u16>,
    pub data_port: u16,
    pub protocol: ProtocolVariant,
    pub family: DeviceFamily,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub frame_timeout_ms: u64,
    pub session_timeout_s: u8,
    pub client_id: String,
    pub max_control_frame: usize,
    pub max_blob_size: usize,
    pub nominal_fps: f64,
    pub max_consecutive_errors: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            control_port: None,
            data_port: DEFAULT_DATA_PORT,
            protocol: ProtocolVariant::Cola2,
            family: DeviceFamily::VisionaryTMini,
            connect_timeout_ms: 5000,
            command_timeout_ms: 5000,
            frame_timeout_ms: 5000,
            session_timeout_s: 50,
            client_id: "visionary".to_string(),
            max_control_frame: DEFAULT_MAX_CONTROL_FRAME,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            nominal_fps: 30.0,
            max_consecutive_errors: 10,
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DeviceConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| VisionaryError::config(format!("YAML parsing failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| VisionaryError::File { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| VisionaryError::config(format!("YAML serialization failed: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(VisionaryError::config("host must not be empty"));
        }
        if self.control_port == Some(0) || self.data_port == 0 {
            return Err(VisionaryError::config("ports must be non-zero"));
        }
        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("command_timeout_ms", self.command_timeout_ms),
            ("frame_timeout_ms", self.frame_timeout_ms),
        ] {
            if value == 0 {
                return Err(VisionaryError::config(format!("{} must be positive", name)));
            }
        }
        if self.client_id.len() > u8::MAX as usize {
            return Err(VisionaryError::config("client_id longer than 255 bytes"));
        }
        if self.max_control_frame < 64 || self.max_blob_size < 64 {
            return Err(VisionaryError::config("frame size limits below 64 bytes"));
        }
        if !self.nominal_fps.is_finite() || self.nominal_fps <= 0.0 {
            return Err(VisionaryError::config(format!(
                "nominal_fps {} must be positive",
                self.nominal_fps
            )));
        }
        if self.max_consecutive_errors == 0 {
            return Err(VisionaryError::config("max_consecutive_errors must be at least 1"));
        }
        Ok(())
    }

    /// Configured control port, or the protocol's standard port.
    pub fn control_port(&self) -> u16 {
        self.control_port.unwrap_or_else(|| self.protocol.default_port())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            command_timeout: self.command_timeout(),
            session_timeout_s: self.session_timeout_s,
            client_id: self.client_id.clone(),
            max_frame: self.max_control_frame,
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions { connect_timeout: self.connect_timeout(), max_blob_size: self.max_blob_size }
    }

    pub fn acquisition_options(&self) -> AcquisitionOptions {
        AcquisitionOptions {
            frame_timeout: self.frame_timeout(),
            max_consecutive_errors: self.max_consecutive_errors,
            nominal_fps: self.nominal_fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_follow_protocol() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_port(), 2122);
        assert_eq!(config.command_timeout(), Duration::from_secs(5));

        let config = DeviceConfig { protocol: ProtocolVariant::ColaB, ..Default::default() };
        assert_eq!(config.control_port(), 2112);

        let config = DeviceConfig { control_port: Some(3000), ..Default::default() };
        assert_eq!(config.control_port(), 3000);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = DeviceConfig::from_yaml_str("host: 10.1.2.3\nframe_timeout_ms: 250\n").unwrap();
        assert_eq!(config.host, "10.1.2.3");
        assert_eq!(config.frame_timeout(), Duration::from_millis(250));
        assert_eq!(config.protocol, ProtocolVariant::Cola2);
    }

    #[test]
    fn invalid_documents_are_config_errors() {
        assert!(matches!(
            DeviceConfig::from_yaml_str("hots: typo\n"),
            Err(VisionaryError::Config { .. })
        ));
        assert!(matches!(
            DeviceConfig::from_yaml_str("protocol: cola_x\n"),
            Err(VisionaryError::Config { .. })
        ));
        assert!(matches!(
            DeviceConfig::from_yaml_str("command_timeout_ms: 0\n"),
            Err(VisionaryError::Config { .. })
        ));
        assert!(DeviceConfig::from_yaml_str("nominal_fps: -1\n").is_err());
    }

    #[test]
    fn file_roundtrip() {
        let config = DeviceConfig {
            host: "camera.local".into(),
            family: DeviceFamily::VisionaryS,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml_string().unwrap().as_bytes()).unwrap();

        let loaded = DeviceConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = DeviceConfig::from_yaml_file("/nonexistent/visionary.yaml").unwrap_err();
        match err {
            VisionaryError::File { path, .. } => assert!(path.ends_with("visionary.yaml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
