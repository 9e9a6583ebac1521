// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file (or start from defaults)
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML, TOML or JSON by extension
//! 4. Apply `REPORT_*` environment overrides
//! 5. Read the signing key file, if one is configured
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! REPORT_AUTH_SIGNING_KEY=...
//! REPORT_AUTH_SIGNING_KEY_FILE=/run/secrets/jwt
//! REPORT_SERVER_PORT=9090
//! REPORT_STORE_BACKEND=memory
//! REPORT_STORE_URL=sqlite:///var/lib/report/report.db
//! REPORT_REVOCATION_MODE=stateless
//! REPORT_LOG_LEVEL=debug
//! REPORT_LOG_FORMAT=json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use report_core::RevocationMode;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{AppConfig, LogFormat, LogLevel, SecretValue, StoreBackend};

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::unsupported_format(other)),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`AppConfig`] from files and the environment.
///
/// ```no_run
/// use report_config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("report.yaml").unwrap();
/// println!("listening on {}", config.server.socket_addr());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    env_prefix: String,
    resolve_env_vars: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the `REPORT` prefix and env resolution on.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "REPORT".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the base path for resolving a relative key file.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(&content)
        } else {
            content
        };

        let config = parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        self.finish(config, &base_path)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let config = parse_str(&content, format)?;
        let base_path = self.base_path.clone().unwrap_or_else(|| PathBuf::from("."));
        self.finish(config, &base_path)
    }

    /// Builds configuration from defaults and the environment alone.
    pub fn load_defaults(&self) -> ConfigResult<AppConfig> {
        info!("No configuration file given; using defaults and environment");
        let base_path = self.base_path.clone().unwrap_or_else(|| PathBuf::from("."));
        self.finish(AppConfig::default(), &base_path)
    }

    fn finish(&self, mut config: AppConfig, base_path: &Path) -> ConfigResult<AppConfig> {
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        load_signing_key_file(&mut config, base_path)?;
        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            backend = ?config.store.backend,
            revocation_mode = config.auth.revocation_mode.as_str(),
            port = config.server.port,
            "Effective configuration"
        );
        Ok(config)
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = env::var(&name).ok();
        (name, value)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let (_, Some(value)) = self.var("AUTH_SIGNING_KEY") {
            config.auth.signing_key = Some(SecretValue::new(value));
        }
        if let (_, Some(value)) = self.var("AUTH_SIGNING_KEY_FILE") {
            config.auth.signing_key_file = Some(PathBuf::from(value));
        }
        if let (name, Some(value)) = self.var("SERVER_PORT") {
            config.server.port = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected valid port number"))?;
        }
        if let (name, Some(value)) = self.var("STORE_BACKEND") {
            config.store.backend = match value.to_ascii_lowercase().as_str() {
                "sqlite" => StoreBackend::Sqlite,
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::invalid_env_var(
                        name,
                        "expected 'sqlite' or 'memory'",
                    ))
                }
            };
        }
        if let (_, Some(value)) = self.var("STORE_URL") {
            config.store.url = value;
        }
        if let (name, Some(value)) = self.var("REVOCATION_MODE") {
            config.auth.revocation_mode = RevocationMode::parse(&value).ok_or_else(|| {
                ConfigError::invalid_env_var(name, "expected 'strict' or 'stateless'")
            })?;
        }
        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            match parse_log_level(&value) {
                Some(level) => config.logging.level = level,
                None => warn!("Ignoring {}: unknown level '{}'", name, value),
            }
        }
        if let (name, Some(value)) = self.var("LOG_FORMAT") {
            match parse_log_format(&value) {
                Some(format) => config.logging.format = format,
                None => warn!("Ignoring {}: unknown format '{}'", name, value),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn parse_yaml<T: DeserializeOwned + Default>(content: &str) -> ConfigResult<T> {
    // An empty YAML document is `null`, not an empty mapping.
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Inline key wins; otherwise the key file is read and trimmed.
fn load_signing_key_file(config: &mut AppConfig, base_path: &Path) -> ConfigResult<()> {
    if config.auth.signing_key.is_some() {
        return Ok(());
    }
    let Some(file) = config.auth.signing_key_file.as_ref() else {
        return Ok(());
    };

    let path = if file.is_relative() {
        base_path.join(file)
    } else {
        file.clone()
    };
    let raw = fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
    debug!("Read signing key from {}", path.display());
    config.auth.signing_key = Some(SecretValue::new(raw.trim()));
    Ok(())
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// An unset variable without a default keeps its placeholder text.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next();

        let mut inner = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            inner.push(c);
        }

        if !closed {
            result.push_str("${");
            result.push_str(&inner);
            continue;
        }

        let (name, default) = match inner.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (inner.as_str(), None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&format!("${{{name}}}"));
            }
        }
    }

    result
}

fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    /// A loader whose overrides read a prefix no other test sets.
    fn isolated(prefix: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(prefix)
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.YML")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("a.ini")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_load_yaml() {
        let yaml = format!(
            r#"
server:
  port: 9000
auth:
  signing_key: "{KEY}"
  access_ttl_secs: 600
  revocation_mode: stateless
store:
  backend: memory
authorization:
  override_roles: [root]
logging:
  level: debug
  format: json
"#
        );
        let file = write_temp(".yaml", &yaml);
        let config = isolated("REPORT_T_YAML").load(file.path()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.access_ttl_secs, 600);
        assert_eq!(config.auth.revocation_mode, RevocationMode::Stateless);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.authorization.override_roles, vec!["root".to_string()]);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml() {
        let toml = format!(
            r#"
[auth]
signing_key = "{KEY}"

[store]
url = "sqlite::memory:"

[reports]
moderate_roles = ["staff"]
"#
        );
        let file = write_temp(".toml", &toml);
        let config = isolated("REPORT_T_TOML").load(file.path()).unwrap();

        assert!(config.store.options().is_memory());
        assert_eq!(config.reports.moderate_roles, vec!["staff".to_string()]);
        assert_eq!(config.auth.revocation_mode, RevocationMode::Strict);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_temp(".yaml", "server:\n  prot: 1\n");
        assert!(matches!(
            isolated("REPORT_T_UNKNOWN").load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let file = write_temp(".yaml", "server:\n  port: 8081\n");
        assert!(matches!(
            isolated("REPORT_T_NOKEY").load(file.path()),
            Err(ConfigError::SigningKey { .. })
        ));
    }

    #[test]
    fn test_file_not_found() {
        assert!(matches!(
            load_config("/definitely/not/here.yaml"),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_signing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jwt.key"), format!("{KEY}\n")).unwrap();
        let config_path = dir.path().join("report.yaml");
        fs::write(&config_path, "auth:\n  signing_key_file: jwt.key\n").unwrap();

        let config = isolated("REPORT_T_KEYFILE").load(&config_path).unwrap();
        assert_eq!(config.auth.signing_key.unwrap().expose(), KEY);
    }

    #[test]
    fn test_unreadable_key_file_is_fatal() {
        let file = write_temp(".yaml", "auth:\n  signing_key_file: /no/such/key\n");
        assert!(matches!(
            isolated("REPORT_T_BADFILE").load(file.path()),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("REPORT_T_ENV_AUTH_SIGNING_KEY", KEY);
        env::set_var("REPORT_T_ENV_SERVER_PORT", "7070");
        env::set_var("REPORT_T_ENV_STORE_BACKEND", "memory");
        env::set_var("REPORT_T_ENV_REVOCATION_MODE", "stateless");

        let config = isolated("REPORT_T_ENV").load_defaults().unwrap();
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.revocation_mode, RevocationMode::Stateless);

        env::set_var("REPORT_T_ENV_SERVER_PORT", "http");
        assert!(matches!(
            isolated("REPORT_T_ENV").load_defaults(),
            Err(ConfigError::InvalidEnvVar { .. })
        ));

        for var in [
            "AUTH_SIGNING_KEY",
            "SERVER_PORT",
            "STORE_BACKEND",
            "REVOCATION_MODE",
        ] {
            env::remove_var(format!("REPORT_T_ENV_{var}"));
        }
    }

    #[test]
    fn test_placeholders() {
        env::set_var("REPORT_T_PLACEHOLDER_KEY", KEY);
        let yaml = "auth:\n  signing_key: \"${REPORT_T_PLACEHOLDER_KEY}\"\nserver:\n  port: ${REPORT_T_UNSET_PORT:8181}\n";
        let config = isolated("REPORT_T_PH")
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.auth.signing_key.unwrap().expose(), KEY);
        env::remove_var("REPORT_T_PLACEHOLDER_KEY");

        assert_eq!(
            resolve_env_placeholders("a ${REPORT_T_NEVER_SET} b ${unclosed"),
            "a ${REPORT_T_NEVER_SET} b ${unclosed"
        );
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        env::set_var("REPORT_T_EMPTY_AUTH_SIGNING_KEY", KEY);
        let config = isolated("REPORT_T_EMPTY")
            .load_from_str("", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.server.port, crate::schema::DEFAULT_PORT);
        env::remove_var("REPORT_T_EMPTY_AUTH_SIGNING_KEY");
    }
}
