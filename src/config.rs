use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::browser::DEFAULT_LAUNCH_TIMEOUT;
use crate::crawler::{DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_NETWORK_IDLE_TIMEOUT};
use crate::plugins::screenshot::{
    DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_SETTLE_DELAY, DEFAULT_VISIBILITY_TIMEOUT,
};
use crate::ViewportSelection;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("{0}")]
    Read(#[from] std::io::Error),
    #[error("{0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_depth: Option<usize>,
    pub single_page: bool,
    pub headless: bool,
    pub concurrency: usize,
    pub ignore_patterns: Vec<String>,
    pub cache_extensions: Vec<String>,
    pub node_command: String,
    pub timeouts: Timeouts,
    pub screenshots: ScreenshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: None,
            single_page: false,
            headless: true,
            concurrency: 1,
            ignore_patterns: Vec::new(),
            cache_extensions: ["js", "css", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            node_command: "node".to_string(),
            timeouts: Timeouts::default(),
            screenshots: ScreenshotConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    #[serde(with = "humantime_serde")]
    pub network_idle: Duration,
    #[serde(with = "humantime_serde")]
    pub element_visible: Duration,
    #[serde(with = "humantime_serde")]
    pub discovery: Duration,
    /// Wait after a demo becomes visible; may be zero.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub launch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle: DEFAULT_NETWORK_IDLE_TIMEOUT,
            element_visible: DEFAULT_VISIBILITY_TIMEOUT,
            discovery: DEFAULT_DISCOVERY_TIMEOUT,
            settle: DEFAULT_SETTLE_DELAY,
            launch: DEFAULT_LAUNCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenshotConfig {
    pub dir: PathBuf,
    pub viewports: ViewportSelection,
    pub color_schemes: bool,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("screenshots"),
            viewports: ViewportSelection::Both,
            color_schemes: true,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/democrawl/config.toml`, else `~/.config/democrawl/config.toml`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("democrawl").join("config.toml"))
    }

    /// Reads `path` if given, else the central config if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path() {
                Some(central) if central.is_file() => Self::from_file(&central),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.node_command.trim().is_empty() {
            return Err("node_command must not be empty".to_string());
        }
        for pattern in &self.ignore_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| format!("ignore pattern {pattern:?} is invalid: {e}"))?;
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("navigation", t.navigation),
            ("network_idle", t.network_idle),
            ("element_visible", t.element_visible),
            ("discovery", t.discovery),
            ("launch", t.launch),
        ] {
            if value.is_zero() {
                return Err(format!("timeouts.{name} must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn default_values_match_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.max_depth, None);
        assert!(cfg.headless);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(5));
        assert_eq!(cfg.timeouts.network_idle, Duration::from_secs(2));
        assert_eq!(cfg.timeouts.element_visible, Duration::from_secs(10));
        assert_eq!(cfg.timeouts.discovery, Duration::from_secs(30));
        assert_eq!(cfg.timeouts.settle, Duration::from_secs(3));
        assert_eq!(cfg.screenshots.viewports, ViewportSelection::Both);
        assert!(cfg.screenshots.color_schemes);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_partial_file_with_humantime_durations() {
        let file = write_config(
            r#"
max_depth = 2
ignore_patterns = ["favicon\\.ico"]

[timeouts]
navigation = "8s"
settle = "500ms"

[screenshots]
viewports = "mobile"
color_schemes = false
"#,
        );
        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.max_depth, Some(2));
        assert_eq!(cfg.ignore_patterns, vec![r"favicon\.ico"]);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(8));
        assert_eq!(cfg.timeouts.settle, Duration::from_millis(500));
        assert_eq!(cfg.timeouts.network_idle, Duration::from_secs(2));
        assert_eq!(cfg.screenshots.viewports, ViewportSelection::Mobile);
        assert!(!cfg.screenshots.color_schemes);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("max_dept = 2\n");
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigFileError::Parse(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigFileError::Read(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(cfg.validate().unwrap_err().contains("concurrency"));

        let cfg = Config {
            ignore_patterns: vec!["(".to_string()],
            ..Config::default()
        };
        assert!(cfg.validate().unwrap_err().contains("ignore pattern"));

        let mut cfg = Config::default();
        cfg.timeouts.discovery = Duration::ZERO;
        assert!(cfg.validate().unwrap_err().contains("timeouts.discovery"));

        let mut cfg = Config::default();
        cfg.timeouts.settle = Duration::ZERO;
        assert!(cfg.validate().is_ok());
    }
}
