use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::ColorSpace;
use crate::effect::IdleSettings;
use crate::stream::{DtlsConnector, PskCredentials};
use crate::Settings;

/// Configuration manager for Glow settings
/// Separates the schema of available options from the persisted values.
/// Configuration is stored in glow.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub bridge: BridgeConfigSchema,
    pub transport: TransportConfigSchema,
    pub idle: IdleConfigSchema,
    pub session: SessionConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfigSchema {
    pub bridge_ip: ConfigOption<String>,
    pub stream_port: ConfigOption<u16>,
    pub application_id: ConfigOption<String>,
    pub client_key: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfigSchema {
    pub handshake_timeout_ms: ConfigOption<u64>,
    pub handshake_attempts: ConfigOption<u32>,
    pub color_space: ConfigOption<ColorSpace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfigSchema {
    pub idle_duration_ms: ConfigOption<u64>,
    pub idle_interval_ms: ConfigOption<u64>,
    pub idle_dip_brightness: ConfigOption<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfigSchema {
    pub shutdown_grace_ms: ConfigOption<u64>,
    pub channel_count: ConfigOption<usize>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T: PartialOrd + Copy> ConfigOption<T> {
    fn out_of_range(&self, value: T) -> Option<(T, T)> {
        match self.valid_range {
            Some((min, max)) if value < min || value > max => Some((min, max)),
            _ => None,
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'glow.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("glow.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes a default file first if none exists
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: self.created_at().unwrap_or_else(|| now.clone()),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Creation stamp of the file already on disk, if it can be read.
    fn created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        serde_json::from_str::<ConfigFile>(&content)
            .ok()
            .map(|file| file.created_at)
    }

    /// Validate, then update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            bridge: BridgeConfigSchema {
                bridge_ip: ConfigOption {
                    default: defaults.bridge_ip,
                    valid_range: None,
                    valid_choices: None,
                    description: "IP address of the bridge that owns the entertainment group"
                        .to_string(),
                    requires_restart: true,
                },
                stream_port: ConfigOption {
                    default: defaults.stream_port,
                    valid_range: Some((1024, 65535)),
                    valid_choices: None,
                    description: "UDP port of the streaming endpoint".to_string(),
                    requires_restart: true,
                },
                application_id: ConfigOption {
                    default: defaults.application_id,
                    valid_range: None,
                    valid_choices: None,
                    description: "Application id issued at pairing, used as the PSK identity"
                        .to_string(),
                    requires_restart: true,
                },
                client_key: ConfigOption {
                    default: defaults.client_key,
                    valid_range: None,
                    valid_choices: None,
                    description: "Client key issued at pairing (32 hex characters)".to_string(),
                    requires_restart: true,
                },
            },
            transport: TransportConfigSchema {
                handshake_timeout_ms: ConfigOption {
                    default: defaults.handshake_timeout_ms,
                    valid_range: Some((500, 10_000)),
                    valid_choices: None,
                    description: "DTLS handshake timeout per attempt in milliseconds".to_string(),
                    requires_restart: true,
                },
                handshake_attempts: ConfigOption {
                    default: defaults.handshake_attempts,
                    valid_range: Some((1, 10)),
                    valid_choices: None,
                    description: "Handshake attempts before giving up".to_string(),
                    requires_restart: true,
                },
                color_space: ConfigOption {
                    default: defaults.color_space,
                    valid_range: None,
                    valid_choices: Some(vec![ColorSpace::Xy, ColorSpace::Rgb]),
                    description: "Color space of every channel in a frame".to_string(),
                    requires_restart: true,
                },
            },
            idle: IdleConfigSchema {
                idle_duration_ms: ConfigOption {
                    default: defaults.idle_duration_ms,
                    valid_range: Some((1000, 60_000)),
                    valid_choices: None,
                    description: "Length of one idle animation cycle in milliseconds".to_string(),
                    requires_restart: true,
                },
                idle_interval_ms: ConfigOption {
                    default: defaults.idle_interval_ms,
                    valid_range: Some((10, 1000)),
                    valid_choices: None,
                    description: "Tick interval of the idle animation in milliseconds".to_string(),
                    requires_restart: true,
                },
                idle_dip_brightness: ConfigOption {
                    default: defaults.idle_dip_brightness,
                    valid_range: Some((0.0, 255.0)),
                    valid_choices: None,
                    description: "Brightness the idle animation dips to".to_string(),
                    requires_restart: true,
                },
            },
            session: SessionConfigSchema {
                shutdown_grace_ms: ConfigOption {
                    default: defaults.shutdown_grace_ms,
                    valid_range: Some((100, 10_000)),
                    valid_choices: None,
                    description: "Time allowed for a clean shutdown before forcing exit"
                        .to_string(),
                    requires_restart: false,
                },
                channel_count: ConfigOption {
                    default: defaults.channel_count,
                    valid_range: Some((1, 20)),
                    valid_choices: None,
                    description: "Channels in the group when statuses are not queried".to_string(),
                    requires_restart: true,
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        // Bridge settings
        if settings.bridge_ip.parse::<IpAddr>().is_err() {
            errors.push(format!("bridge_ip {:?} is not an IP address", settings.bridge_ip));
        }
        if let Some((min, max)) = schema.bridge.stream_port.out_of_range(settings.stream_port) {
            errors.push(format!("stream_port must be between {} and {}", min, max));
        }
        if !settings.client_key.is_empty() {
            let valid = settings.client_key.len() == 32
                && settings.client_key.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                errors.push("client_key must be 32 hex characters".to_string());
            }
        }

        // Transport settings
        if let Some((min, max)) = schema
            .transport
            .handshake_timeout_ms
            .out_of_range(settings.handshake_timeout_ms)
        {
            errors.push(format!(
                "handshake_timeout_ms must be between {} and {}",
                min, max
            ));
        }
        if let Some((min, max)) = schema
            .transport
            .handshake_attempts
            .out_of_range(settings.handshake_attempts)
        {
            errors.push(format!("handshake_attempts must be between {} and {}", min, max));
        }

        // Idle settings
        if let Some((min, max)) = schema.idle.idle_duration_ms.out_of_range(settings.idle_duration_ms) {
            errors.push(format!("idle_duration_ms must be between {} and {}", min, max));
        }
        if let Some((min, max)) = schema.idle.idle_interval_ms.out_of_range(settings.idle_interval_ms) {
            errors.push(format!("idle_interval_ms must be between {} and {}", min, max));
        }
        if let Some((min, max)) = schema
            .idle
            .idle_dip_brightness
            .out_of_range(settings.idle_dip_brightness)
        {
            errors.push(format!(
                "idle_dip_brightness must be between {} and {}",
                min, max
            ));
        }

        // Session settings
        if let Some((min, max)) = schema
            .session
            .shutdown_grace_ms
            .out_of_range(settings.shutdown_grace_ms)
        {
            errors.push(format!("shutdown_grace_ms must be between {} and {}", min, max));
        }
        if let Some((min, max)) = schema.session.channel_count.out_of_range(settings.channel_count) {
            errors.push(format!("channel_count must be between {} and {}", min, max));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

impl Settings {
    pub fn idle(&self) -> IdleSettings {
        IdleSettings {
            duration_ms: self.idle_duration_ms,
            interval_ms: self.idle_interval_ms,
            dip_brightness: self.idle_dip_brightness,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn stream_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bridge_ip.parse().map_err(|_| {
            ConfigError::ValidationError(vec![format!(
                "bridge_ip {:?} is not an IP address",
                self.bridge_ip
            )])
        })?;
        Ok(SocketAddr::new(ip, self.stream_port))
    }

    pub fn credentials(&self) -> Result<PskCredentials, ConfigError> {
        PskCredentials::from_hex(&self.application_id, &self.client_key)
            .map_err(|e| ConfigError::ValidationError(vec![e.to_string()]))
    }

    /// DTLS connector for the configured bridge and credentials.
    pub fn connector(&self) -> Result<DtlsConnector, ConfigError> {
        Ok(
            DtlsConnector::new(self.stream_address()?, self.credentials()?)
                .with_handshake_timeout(self.handshake_timeout()),
        )
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}
