use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Deserializer, de};
use thiserror::Error;
use time::{UtcOffset, macros::format_description};
use tracing::warn;

const CONFIG_DIR: &str = "todo-sync";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_TABLE: &str = "todos";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DASHBOARD_MONTHS: usize = 6;

/// Client configuration loaded from `<config_dir>/todo-sync/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Where tasks and accounts live.
    #[serde(default)]
    pub backend: BackendConfig,
    /// How dates and the dashboard are presented.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Platform default location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `explicit`, or from [`Self::default_path`] when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            return Self::from_path(path);
        }
        Self::default_path().map_or_else(|| Ok(Self::default()), Self::from_path)
    }

    /// Load from `path`, falling back to defaults when it is absent.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.display.validate()
    }
}

/// `[backend]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    url: Option<String>,
    /// Public API key sent with every request.
    #[serde(default)]
    anon_key: Option<String>,
    #[serde(default = "default_table")]
    table: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_owned()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            table: default_table(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Backend pointing at `url`, other fields defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    /// Configured base URL without a trailing slash, required for remote use.
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| anyhow!("backend.url is not configured"))
    }

    /// API key, if configured.
    pub fn anon_key(&self) -> Option<&str> {
        self.anon_key.as_deref()
    }

    /// Task table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Per-request timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("backend.timeout_secs must be greater than zero");
        }
        if self.table.trim().is_empty() {
            bail!("backend.table must not be empty");
        }
        if let Some(url) = &self.url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            bail!("backend.url must start with http:// or https://, got '{url}'");
        }
        Ok(())
    }
}

/// `[display]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Offset used to bucket tasks into days and months.
    #[serde(default)]
    pub utc_offset: OffsetSetting,
    /// Months shown by the stats dashboard; at least 1.
    #[serde(default = "default_dashboard_months")]
    pub dashboard_months: usize,
}

const fn default_dashboard_months() -> usize {
    DEFAULT_DASHBOARD_MONTHS
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset: OffsetSetting::Local,
            dashboard_months: DEFAULT_DASHBOARD_MONTHS,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<()> {
        if self.dashboard_months == 0 {
            bail!("display.dashboard_months must be at least 1");
        }
        Ok(())
    }
}

/// Offset used for calendar days: the machine's, or a fixed one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetSetting {
    /// The machine's offset at startup.
    #[default]
    Local,
    /// A fixed offset such as `+09:00`.
    Fixed(UtcOffset),
}

impl OffsetSetting {
    /// Concrete offset. `Local` is read from the OS and falls back to UTC.
    ///
    /// Resolve before spawning threads; the OS lookup refuses to run in a
    /// multi-threaded process on some platforms.
    pub fn resolve(self) -> UtcOffset {
        match self {
            Self::Fixed(offset) => offset,
            Self::Local => UtcOffset::current_local_offset().unwrap_or_else(|err| {
                warn!(error = %err, "local offset unavailable; using UTC");
                UtcOffset::UTC
            }),
        }
    }
}

/// Rejected `display.utc_offset` value.
#[derive(Debug, Error)]
#[error("invalid utc offset '{0}': expected \"local\", \"UTC\" or \"+HH:MM\"")]
pub struct OffsetParseError(String);

impl FromStr for OffsetSetting {
    type Err = OffsetParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::Fixed(UtcOffset::UTC));
        }
        UtcOffset::parse(trimmed, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
            .map(Self::Fixed)
            .map_err(|_| OffsetParseError(raw.to_owned()))
    }
}

impl fmt::Display for OffsetSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Fixed(offset) => {
                let (hours, minutes, _) = offset.as_hms();
                let sign = if offset.is_negative() { '-' } else { '+' };
                write!(f, "{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
            }
        }
    }
}

impl<'de> Deserialize<'de> for OffsetSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use time::macros::offset;

    fn write_config(dir: &Path, body: &str) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE);
        let mut file = fs::File::create(&path)?;
        writeln!(file, "{body}")?;
        Ok(path)
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let cfg = AppConfig::from_path(dir.path().join(CONFIG_FILE))?;
        assert_eq!(cfg.backend.table(), "todos");
        assert_eq!(cfg.backend.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.display.dashboard_months, 6);
        assert_eq!(cfg.display.utc_offset, OffsetSetting::Local);
        assert!(cfg.backend.require_url().is_err());
        Ok(())
    }

    #[test]
    fn explicit_missing_path_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("nope.toml");
        let Err(err) = AppConfig::load(Some(&missing)) else {
            panic!("explicit missing config should error");
        };
        assert!(err.to_string().contains("does not exist"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = write_config(
            dir.path(),
            "[backend]\nurl = \"https://demo.supabase.co/\"\nanon_key = \"public\"\ntable = \"items\"\ntimeout_secs = 3\n\n[display]\nutc_offset = \"+09:00\"\ndashboard_months = 12",
        )?;

        let cfg = AppConfig::load(Some(&path))?;
        assert_eq!(cfg.backend.require_url()?, "https://demo.supabase.co");
        assert_eq!(cfg.backend.anon_key(), Some("public"));
        assert_eq!(cfg.backend.table(), "items");
        assert_eq!(cfg.backend.timeout(), Duration::from_secs(3));
        assert_eq!(cfg.display.utc_offset, OffsetSetting::Fixed(offset!(+9)));
        assert_eq!(cfg.display.utc_offset.resolve(), offset!(+9));
        assert_eq!(cfg.display.dashboard_months, 12);
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = write_config(dir.path(), "[backend]\ntimeout_secs = 0")?;
        let Err(err) = AppConfig::from_path(&path) else {
            panic!("zero timeout should error");
        };
        assert!(format!("{err:#}").contains("timeout_secs must be greater than zero"));
        Ok(())
    }

    #[test]
    fn zero_dashboard_months_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = write_config(dir.path(), "[display]\ndashboard_months = 0")?;
        let Err(err) = AppConfig::from_path(&path) else {
            panic!("zero months should error");
        };
        assert!(format!("{err:#}").contains("dashboard_months must be at least 1"));
        Ok(())
    }

    #[test]
    fn non_http_url_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = write_config(dir.path(), "[backend]\nurl = \"ftp://example.invalid\"")?;
        assert!(AppConfig::from_path(&path).is_err());
        Ok(())
    }

    #[test]
    fn bad_offset_fails_to_parse() -> Result<()> {
        let dir = tempdir()?;
        let path = write_config(dir.path(), "[display]\nutc_offset = \"tokyo\"")?;
        let Err(err) = AppConfig::from_path(&path) else {
            panic!("bad offset should error");
        };
        assert!(format!("{err:#}").contains("invalid utc offset"));
        Ok(())
    }

    #[test]
    fn offset_setting_parses_and_displays() -> Result<()> {
        assert_eq!("local".parse::<OffsetSetting>()?, OffsetSetting::Local);
        assert_eq!("UTC".parse::<OffsetSetting>()?, OffsetSetting::Fixed(UtcOffset::UTC));
        let west: OffsetSetting = "-05:30".parse()?;
        assert_eq!(west, OffsetSetting::Fixed(offset!(-5:30)));
        assert_eq!(west.to_string(), "-05:30");
        assert_eq!(OffsetSetting::Fixed(offset!(+9)).to_string(), "+09:00");
        assert!("+9".parse::<OffsetSetting>().is_err());
        Ok(())
    }
}
