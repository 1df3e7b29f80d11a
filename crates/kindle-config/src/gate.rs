//! Transpilation gate settings.
//!
//! A [`GateConfig`] is assembled once, either from a configuration file,
//! from the builder methods or from a directive block:
//!
//! ```text
//! ct {
//!     strict
//!     mime application/x-yaml
//!     platform ec2
//! }
//! ```
//!
//! After [`GateConfig::provision`] it is frozen behind an `Arc` and shared
//! by every request without locking.

use crate::{ConfigError, ConfigResult};
use kindle_core::{Platform, DEFAULT_SOURCE_MEDIA_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the directive that opens a gate block.
pub const DIRECTIVE_NAME: &str = "ct";

/// Settings of the transpilation gate.
///
/// # Example
///
/// ```
/// use kindle_config::GateConfig;
///
/// let config = GateConfig::new().strict().mime("application/x-yaml").platform("ec2");
/// assert!(config.allows("application/x-yaml"));
/// assert!(!config.allows("text/plain"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Treat transpiler warnings as failures.
    pub strict: bool,

    /// Content types eligible for transpilation.
    ///
    /// Empty means only [`DEFAULT_SOURCE_MEDIA_TYPE`].
    pub mime_types: Vec<String>,

    /// Target platform handed to the transpiler.
    pub platform: Option<String>,
}

impl GateConfig {
    /// Creates a non-strict configuration with the default allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables strict mode.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Adds a content type to the allow-list.
    #[must_use]
    pub fn mime(mut self, media_type: impl Into<String>) -> Self {
        self.mime_types.push(media_type.into());
        self
    }

    /// Sets the target platform.
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Returns the allow-list in effect.
    #[must_use]
    pub fn effective_mime_types(&self) -> Vec<&str> {
        if self.mime_types.is_empty() {
            vec![DEFAULT_SOURCE_MEDIA_TYPE]
        } else {
            self.mime_types.iter().map(String::as_str).collect()
        }
    }

    /// Returns whether `media_type` is on the allow-list.
    ///
    /// The comparison is exact and case-sensitive; callers strip parameters
    /// first.
    #[must_use]
    pub fn allows(&self, media_type: &str) -> bool {
        if self.mime_types.is_empty() {
            media_type == DEFAULT_SOURCE_MEDIA_TYPE
        } else {
            self.mime_types.iter().any(|allowed| allowed == media_type)
        }
    }

    /// Checks the allow-list entries and the platform name.
    pub fn validate(&self) -> ConfigResult<()> {
        for (i, media_type) in self.mime_types.iter().enumerate() {
            let field = format!("gate.mime_types[{i}]");
            if media_type.is_empty() {
                return Err(ConfigError::invalid_value(field, "must not be empty"));
            }
            if media_type.contains(';') || media_type.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid_value(
                    field,
                    format!("\"{media_type}\" must be a bare media type without parameters"),
                ));
            }
        }

        if let Some(platform) = &self.platform {
            platform
                .parse::<Platform>()
                .map_err(|err| ConfigError::invalid_value("gate.platform", err.to_string()))?;
        }

        Ok(())
    }

    /// Validates and freezes the configuration for request handling.
    pub fn provision(self) -> ConfigResult<Arc<Self>> {
        self.validate()?;
        tracing::info!(
            strict = self.strict,
            mime_types = ?self.effective_mime_types(),
            platform = self.platform.as_deref().unwrap_or("unspecified"),
            "transpilation gate provisioned"
        );
        Ok(Arc::new(self))
    }

    /// Parses a directive block.
    ///
    /// The block opens with `ct`, optionally followed by `{`, and holds one
    /// directive per line. `#` starts a comment. Unknown directives and
    /// wrong argument counts are rejected with the offending line number.
    pub fn from_directives(input: &str) -> ConfigResult<Self> {
        let mut config = Self::default();
        let mut state = BlockState::Start;
        let mut last_line = 0;

        for (n, raw) in input.lines().enumerate() {
            let line = n + 1;
            last_line = line;
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = text.split_whitespace().collect();

            state = match state {
                BlockState::Start => match tokens.as_slice() {
                    [DIRECTIVE_NAME] => BlockState::Bare,
                    [DIRECTIVE_NAME, "{"] => BlockState::Open,
                    [DIRECTIVE_NAME, "{", "}"] => BlockState::Closed,
                    [name, ..] => {
                        return Err(ConfigError::directive(
                            line,
                            format!("expected \"{DIRECTIVE_NAME}\", found \"{name}\""),
                        ))
                    }
                    [] => BlockState::Start,
                },
                BlockState::Bare if tokens == ["{"] => BlockState::Open,
                BlockState::Open if tokens == ["}"] => BlockState::Closed,
                BlockState::Open => {
                    config.apply(line, &tokens)?;
                    BlockState::Open
                }
                BlockState::Bare | BlockState::Closed => {
                    return Err(ConfigError::directive(
                        line,
                        format!("unexpected \"{text}\" outside the block"),
                    ))
                }
            };
        }

        match state {
            BlockState::Start => Err(ConfigError::directive(
                last_line.max(1),
                format!("missing \"{DIRECTIVE_NAME}\" directive"),
            )),
            BlockState::Open => Err(ConfigError::directive(last_line, "unclosed block")),
            BlockState::Bare | BlockState::Closed => Ok(config),
        }
    }

    fn apply(&mut self, line: usize, tokens: &[&str]) -> ConfigResult<()> {
        match tokens {
            ["strict"] => self.strict = true,
            ["mime", media_type] => self.mime_types.push((*media_type).to_string()),
            ["platform", platform] => {
                if self.platform.is_some() {
                    return Err(ConfigError::directive(line, "platform set more than once"));
                }
                self.platform = Some((*platform).to_string());
            }
            ["strict", ..] => {
                return Err(ConfigError::directive(line, "strict takes no arguments"))
            }
            [name @ ("mime" | "platform"), ..] => {
                return Err(ConfigError::directive(
                    line,
                    format!("{name} takes exactly one argument"),
                ))
            }
            [name, ..] => {
                return Err(ConfigError::directive(
                    line,
                    format!("unknown directive \"{name}\""),
                ))
            }
            [] => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum BlockState {
    Start,
    Bare,
    Open,
    Closed,
}
