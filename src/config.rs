use std::fmt;
use std::fs;

/// Configuration file problems.
#[derive(Debug)]
pub enum ConfigError {
    UnknownSection(String),
    UnknownKey(String),
    InvalidValue(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownSection(section) => write!(f, "unknown section '{}'", section),
            ConfigError::UnknownKey(key) => write!(f, "unknown key '{}'", key),
            ConfigError::InvalidValue(key, value) => {
                write!(f, "invalid value '{}' for key '{}'", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub device: DeviceConfig,
    pub auth: AuthConfig,
    pub timeouts: TimeoutConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub user: String,
    pub password: String,
}

/// Per-operation timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub open: u32,
    pub send: u32,
    pub recv: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_colors: bool,
    pub timestamps: bool,
    pub json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                address: "192.168.1.1".to_string(),
                port: 23,
            },
            auth: AuthConfig {
                user: "admin".to_string(),
                password: String::new(),
            },
            timeouts: TimeoutConfig {
                open: 5000,
                send: 5000,
                recv: 5000,
            },
            output: OutputConfig {
                use_colors: true,
                timestamps: false,
                json: false,
            },
        }
    }
}

impl ClientConfig {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_config(&content),
            Err(_) => {
                // Create default config file if it doesn't exist
                let default_config = Self::default();
                let config_content = default_config.to_config_file_format();
                if let Err(err) = fs::write(path, config_content) {
                    eprintln!("Warning: Could not create default config file: {}", err);
                }
                Ok(default_config)
            }
        }
    }

    pub fn parse_config(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Handle sections
            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                continue;
            }

            // Handle key-value pairs
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim().trim_matches('"');

                match current_section.as_str() {
                    "device" => config.parse_device_config(key, value)?,
                    "auth" => config.parse_auth_config(key, value)?,
                    "timeouts" => config.parse_timeout_config(key, value)?,
                    "output" => config.parse_output_config(key, value)?,
                    _ => return Err(ConfigError::UnknownSection(current_section.clone())),
                }
            }
        }

        Ok(config)
    }

    fn parse_device_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "address" => {
                self.device.address = value.to_string();
            }
            "port" => {
                self.device.port = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_auth_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "user" => self.auth.user = value.to_string(),
            "password" => self.auth.password = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_timeout_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let millis: u32 = value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;

        match key {
            "open" => self.timeouts.open = millis,
            "send" => self.timeouts.send = millis,
            "recv" => self.timeouts.recv = millis,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn parse_output_config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "use_colors" => {
                self.output.use_colors = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "timestamps" => {
                self.output.timestamps = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            "json" => {
                self.output.json = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn to_config_file_format(&self) -> String {
        format!(
            r#"# confclient configuration file
# Lines starting with # are comments

[device]
# Management console address and telnet port
address = "{}"
port = {}

[auth]
# Credentials for the interactive login handshake
user = "{}"
password = "{}"

[timeouts]
# Per-operation timeouts in milliseconds (1000..=60000)
open = {}
send = {}
recv = {}

[output]
# Reply rendering
use_colors = {}
timestamps = {}
json = {}
"#,
            self.device.address,
            self.device.port,
            self.auth.user,
            self.auth.password,
            self.timeouts.open,
            self.timeouts.send,
            self.timeouts.recv,
            self.output.use_colors,
            self.output.timestamps,
            self.output.json,
        )
    }
}
