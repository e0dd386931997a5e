mod ini;
mod ini_pest;

pub use ini::{Config, Section};

use std::path::{Path, PathBuf};
use std::time::Duration;

use spoolbridge_api::DEFAULT_MACRO_NAME;
use url::Url;

pub const SPOOLMAN_SECTION: &str = "Spoolman";
pub const KLIPPER_SECTION: &str = "Klipper";
pub const MOONRAKER_SECTION: &str = "Moonraker";

pub const SPOOLMAN_URL_KEY: &str = "SPOOLMAN_URL";
pub const GCODE_PATH_KEY: &str = "GCODE_PATH";
pub const MOONRAKER_URL_KEY: &str = "MOONRAKER_URL";
/// older name of `MOONRAKER_URL`
pub const MOONRAKER_URL_ALIAS: &str = "MOONRAKER_BASE_URL";
pub const MACRO_NAME_KEY: &str = "MACRO_NAME";
pub const TIMEOUT_KEY: &str = "TIMEOUT";

/// timeout of Moonraker requests when not configured
pub const DEFAULT_MOONRAKER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read configuration file '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("syntax error in configuration\n{0}")]
    Syntax(String),
    #[error("line {line}: key '{key}' appears before any [section] header")]
    KeyOutsideSection { key: String, line: usize },
    #[error("line {line}: section [{section}] is defined twice")]
    DuplicateSection { section: String, line: usize },
    #[error("line {line}: key '{key}' is defined twice in section [{section}]")]
    DuplicateKey {
        section: String,
        key: String,
        line: usize,
    },
    #[error("missing section [{0}]")]
    MissingSection(String),
    #[error("missing key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },
    #[error("invalid url '{value}' for '{key}' in section [{section}]: {reason}")]
    InvalidUrl {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid value '{value}' for '{key}' in section [{section}], expected a positive number of seconds")]
    InvalidTimeout {
        section: String,
        key: String,
        value: String,
    },
}

impl Config {
    /// read and parse a configuration file
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config = ini_pest::parse_ini(&text, Some(path.display().to_string().as_str()))?;

        log::debug!(
            "loaded {} sections from '{}'",
            config.sections.len(),
            path.display()
        );

        return Ok(config);
    }
}

/// a relative configuration path is relative to the directory of the running executable
pub fn resolve_config_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match exe_dir {
        Some(dir) => dir.join(path),
        None => {
            log::warn!(
                "cannot locate the executable, looking for '{}' in the working directory",
                path.display()
            );
            path.to_path_buf()
        }
    }
}

/// parse a base url, making sure it ends with exactly one '/'
/// so that joining a relative path appends instead of replacing the last segment
pub fn normalize_base_url(section: &str, key: &str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim().trim_end_matches('/');

    let url = Url::parse(&format!("{}/", trimmed)).map_err(|e| invalid(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    return Ok(url);
}

/// optional timeout in seconds
fn parse_timeout(config: &Config, section: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = config.get(section, TIMEOUT_KEY) else {
        return Ok(None);
    };

    // values too large for a Duration are rejected like any other bad number
    let timeout = value
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .ok_or_else(|| ConfigError::InvalidTimeout {
            section: section.to_string(),
            key: TIMEOUT_KEY.to_string(),
            value: value.to_string(),
        })?;

    return Ok(Some(timeout));
}

/// `[Spoolman]` section
#[derive(Debug, Clone)]
pub struct SpoolmanSettings {
    /// filament endpoint, ends with '/'
    pub url: Url,
    pub timeout: Duration,
}

impl SpoolmanSettings {
    pub fn from_config(config: &Config, default_timeout: Duration) -> Result<Self, ConfigError> {
        let url = config.require(SPOOLMAN_SECTION, SPOOLMAN_URL_KEY)?;

        return Ok(Self {
            url: normalize_base_url(SPOOLMAN_SECTION, SPOOLMAN_URL_KEY, url)?,
            timeout: parse_timeout(config, SPOOLMAN_SECTION)?.unwrap_or(default_timeout),
        });
    }
}

/// `[Klipper]` section
#[derive(Debug, Clone)]
pub struct KlipperSettings {
    /// directory relative gcode file names are looked up in
    pub gcode_path: PathBuf,
}

impl KlipperSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let gcode_path = config.require(KLIPPER_SECTION, GCODE_PATH_KEY)?;

        return Ok(Self {
            gcode_path: PathBuf::from(gcode_path),
        });
    }
}

/// `[Moonraker]` section
#[derive(Debug, Clone)]
pub struct MoonrakerSettings {
    /// base url, ends with '/'
    pub url: Url,
    pub macro_name: String,
    pub timeout: Duration,
}

impl MoonrakerSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let section = config
            .section(MOONRAKER_SECTION)
            .ok_or_else(|| ConfigError::MissingSection(MOONRAKER_SECTION.to_string()))?;

        // errors name the key the url was read from
        let (url_key, url) = match (section.get(MOONRAKER_URL_KEY), section.get(MOONRAKER_URL_ALIAS)) {
            (Some(url), _) => (MOONRAKER_URL_KEY, url),
            (None, Some(url)) => {
                log::warn!(
                    "'{}' is deprecated, rename it to '{}'",
                    MOONRAKER_URL_ALIAS,
                    MOONRAKER_URL_KEY
                );
                (MOONRAKER_URL_ALIAS, url)
            }
            (None, None) => {
                return Err(ConfigError::MissingKey {
                    section: MOONRAKER_SECTION.to_string(),
                    key: MOONRAKER_URL_KEY.to_string(),
                });
            }
        };

        let macro_name = section
            .get(MACRO_NAME_KEY)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MACRO_NAME);

        return Ok(Self {
            url: normalize_base_url(MOONRAKER_SECTION, url_key, url)?,
            macro_name: macro_name.to_string(),
            timeout: parse_timeout(config, MOONRAKER_SECTION)?.unwrap_or(DEFAULT_MOONRAKER_TIMEOUT),
        });
    }
}
