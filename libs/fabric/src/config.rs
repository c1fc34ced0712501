//! Configuration for the dumper.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Environment variables:
//!   GLIMPSE_HOST, GLIMPSE_PORT, GLIMPSE_TIMEOUT_MS, GLIMPSE_SOURCE,
//!   GLIMPSE_SOURCE_ROOT

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};

/// Custom formatting of source labels: `(line, accessor) -> label`
#[derive(Clone)]
pub struct SourceFormatter(Arc<dyn Fn(&str, Option<&str>) -> String + Send + Sync>);

impl SourceFormatter {
    pub fn new(format: impl Fn(&str, Option<&str>) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(format))
    }

    pub fn apply(&self, line: &str, accessor: Option<&str>) -> String {
        (self.0)(line, accessor)
    }
}

impl fmt::Debug for SourceFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SourceFormatter(..)")
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Viewer host.
    pub host: String,
    /// Viewer port.
    pub port: u16,
    /// Attach the call-site source line to each dump.
    pub source: bool,
    /// Per-request timeout in milliseconds. None = wait forever.
    pub timeout_ms: Option<u64>,
    /// Root that call-site file paths are resolved against.
    pub source_root: Option<PathBuf>,
    /// Rewrites source labels before they are sent.
    #[serde(skip)]
    pub source_format: Option<SourceFormatter>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            source: true,
            timeout_ms: None,
            source_root: None,
            source_format: None,
        }
    }
}

impl DumpConfig {
    /// Load config with full resolution: env → file → defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Overlay values found through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("GLIMPSE_HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("GLIMPSE_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("GLIMPSE_PORT is not a port: {}", port)))?;
        }

        if let Some(timeout) = lookup("GLIMPSE_TIMEOUT_MS") {
            let timeout = timeout.trim();
            self.timeout_ms = if timeout.is_empty() || timeout.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(timeout.parse().map_err(|_| {
                    Error::Config(format!("GLIMPSE_TIMEOUT_MS is not a number: {}", timeout))
                })?)
            };
        }

        if let Some(source) = lookup("GLIMPSE_SOURCE") {
            self.source = !matches!(
                source.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }

        if let Some(root) = lookup("GLIMPSE_SOURCE_ROOT") {
            self.source_root = Some(PathBuf::from(root));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_point_at_local_viewer() {
        let config = DumpConfig::default();
        assert_eq!(config.endpoint(), Endpoint::local(5255));
        assert!(config.source);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DumpConfig::from_toml("port = 6000\ntimeout_ms = 250\n").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = DumpConfig::from_toml("port = 6000\nsource = true").unwrap();
        let env: HashMap<&str, &str> = [
            ("GLIMPSE_PORT", "7000"),
            ("GLIMPSE_SOURCE", "off"),
            ("GLIMPSE_TIMEOUT_MS", "none"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 7000);
        assert!(!config.source);
        assert_eq!(config.timeout_ms, None);
    }

    #[test]
    fn bad_port_is_config_error() {
        let mut config = DumpConfig::default();
        let result = config.apply_env(|key| (key == "GLIMPSE_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn formatter_is_applied() {
        let format = SourceFormatter::new(|line, accessor| {
            format!("{} via {}", line, accessor.unwrap_or("call"))
        });
        assert_eq!(format.apply("rows", Some("dump_with")), "rows via dump_with");
    }
}
