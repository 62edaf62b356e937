use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Keys the app binds itself; the read-text trigger may not shadow them.
const RESERVED_KEYS: [char; 3] = ['q', '`', '~'];

/// Client configuration loaded from `iris.toml`.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub poll: PollConfig,
    pub read_text: ReadTextConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

/// Where the vision service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Per-request timeout for status and read-text calls. Absent means the
    /// call may wait indefinitely. Never applied to the video stream.
    pub request_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PollConfig {
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReadTextConfig {
    pub trigger_key: String,
    /// Ignore re-invocation while a request is pending.
    pub single_flight: bool,
}

impl Default for ReadTextConfig {
    fn default() -> Self {
        Self {
            trigger_key: "r".to_string(),
            single_flight: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VideoConfig {
    pub enabled: bool,
    /// Decoded frames wider than this are downscaled before rendering.
    pub max_width: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 320,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            dir: None,
            retention_days: 7,
        }
    }
}

/// `<config_dir>/iris/iris.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("iris").join("iris.toml"))
}

impl ClientConfig {
    /// Parse and validate config TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;

        Self::from_toml_str(&raw).with_context(|| format!("invalid config at {}", path.display()))
    }

    /// Load `explicit` if given (it must exist), else the default path if it
    /// exists, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validate semantic constraints that the schema cannot express.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.server.request_timeout_ms == Some(0) {
            bail!("server.request_timeout_ms must be greater than zero when set");
        }
        if self.poll.interval_ms == 0 {
            bail!("poll.interval_ms must be greater than zero");
        }
        let key = self.trigger_key()?;
        if RESERVED_KEYS.contains(&key.to_ascii_lowercase()) {
            bail!("read_text.trigger_key {key:?} is reserved");
        }
        if self.video.max_width == 0 {
            bail!("video.max_width must be greater than zero");
        }
        if self.logging.retention_days == 0 {
            bail!("logging.retention_days must be at least 1");
        }
        Ok(())
    }

    /// The service origin, always with a trailing slash so endpoint paths join
    /// beneath it.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.server.base_url)
            .with_context(|| format!("server.base_url is not a URL: {}", self.server.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "server.base_url must use http or https, got {}",
                url.scheme()
            );
        }
        if url.query().is_some() || url.fragment().is_some() {
            bail!("server.base_url must not carry a query or fragment");
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.server.request_timeout_ms.map(Duration::from_millis)
    }

    /// The single character that triggers read-text.
    pub fn trigger_key(&self) -> Result<char> {
        let mut chars = self.read_text.trigger_key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() && !c.is_control() => Ok(c),
            _ => bail!(
                "read_text.trigger_key must be a single visible character, got {:?}",
                self.read_text.trigger_key
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:8000/");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.trigger_key().unwrap(), 'r');
        assert!(!config.read_text.single_flight);
        assert!(config.video.enabled);
    }

    #[test]
    fn full_file_parses() {
        let config = ClientConfig::from_toml_str(
            r#"
            [server]
            base_url = "https://vision.local:9000/api"
            request_timeout_ms = 2500

            [poll]
            interval_ms = 250

            [read_text]
            trigger_key = "T"
            single_flight = true

            [video]
            enabled = false
            max_width = 160

            [logging]
            filter = "iris_remote=debug"
            dir = "/tmp/iris"
            retention_days = 3
            "#,
        )
        .unwrap();

        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://vision.local:9000/api/"
        );
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.trigger_key().unwrap(), 'T');
        assert!(config.read_text.single_flight);
        assert!(!config.video.enabled);
        assert_eq!(config.video.max_width, 160);
        assert_eq!(config.logging.dir.as_deref(), Some(Path::new("/tmp/iris")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ClientConfig::from_toml_str("[server]\nhost = \"x\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn rejects_bad_base_url() {
        for url in ["not a url", "ftp://example.com", "http://host/?q=1"] {
            let input = format!("[server]\nbase_url = \"{url}\"\n");
            assert!(ClientConfig::from_toml_str(&input).is_err(), "{url}");
        }
    }

    #[test]
    fn rejects_zero_interval_and_timeout() {
        assert!(ClientConfig::from_toml_str("[poll]\ninterval_ms = 0\n").is_err());
        assert!(ClientConfig::from_toml_str("[server]\nrequest_timeout_ms = 0\n").is_err());
    }

    #[test]
    fn trigger_key_must_be_one_visible_char() {
        for key in ["", "rr", " ", "\t"] {
            let input = format!("[read_text]\ntrigger_key = {key:?}\n");
            assert!(ClientConfig::from_toml_str(&input).is_err(), "{key:?}");
        }
    }

    #[test]
    fn trigger_key_cannot_shadow_reserved_keys() {
        for key in ["q", "Q", "`", "~"] {
            let input = format!("[read_text]\ntrigger_key = {key:?}\n");
            let err = ClientConfig::from_toml_str(&input).unwrap_err();
            assert!(format!("{err:#}").contains("reserved"), "{key}");
        }
    }

    #[test]
    fn rejects_zero_width_and_retention() {
        assert!(ClientConfig::from_toml_str("[video]\nmax_width = 0\n").is_err());
        assert!(ClientConfig::from_toml_str("[logging]\nretention_days = 0\n").is_err());
    }

    #[test]
    fn from_path_reports_location() {
        let tmp = std::env::temp_dir().join("iris-config-test");
        let _ = fs::create_dir_all(&tmp);
        let path = tmp.join("bad.toml");
        fs::write(&path, "[poll]\ninterval_ms = 0\n").unwrap();

        let err = ClientConfig::from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn load_with_missing_explicit_path_fails() {
        let missing = std::env::temp_dir().join("iris-definitely-missing.toml");
        assert!(ClientConfig::load(Some(&missing)).is_err());
    }
}
