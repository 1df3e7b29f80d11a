//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, ConfigResult, KindleConfig};

/// Configuration loader.
///
/// Layers are applied in order, later ones overriding earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables `PREFIX__SECTION__KEY`
///
/// # Example
///
/// ```no_run
/// use kindle_config::ConfigLoader;
///
/// # fn main() -> Result<(), kindle_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("kindle.toml")?
///     .with_env_prefix("KINDLE")
///     .load()?;
///
/// println!("serving {}", config.server.root.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: KindleConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Example
    ///
    /// ```
    /// use kindle_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [gate]
    ///     strict = true
    ///     mime_types = ["application/x-yaml"]
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.gate.strict);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// With prefix `KINDLE`:
    /// - `KINDLE__SERVER__LISTEN=0.0.0.0:8080`
    /// - `KINDLE__GATE__STRICT=true`
    /// - `KINDLE__GATE__MIME_TYPES=application/x-yaml,text/yaml`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    pub fn load(mut self) -> ConfigResult<KindleConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix, env::vars())?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> KindleConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> ConfigResult<KindleConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(
        &mut self,
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> ConfigResult<()> {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if key.starts_with(&marker) {
                self.apply_env_var(&key, &value, prefix)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> ConfigResult<()> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "LISTEN"] => {
                self.config.server.listen = value.to_string();
            }
            ["SERVER", "ROOT"] => {
                self.config.server.root = value.into();
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        ConfigError::env_parse_error(key, "expected integer or 'none'")
                    })?)
                };
            }
            ["SERVER", "TRUST_REQUEST_ID"] => {
                self.config.server.trust_request_id = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["GATE", "STRICT"] => {
                self.config.gate.strict = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["GATE", "MIME_TYPES"] => {
                self.config.gate.mime_types = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["GATE", "PLATFORM"] => {
                self.config.gate.platform = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }

            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "JSON"] => {
                self.config.logging.json = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
