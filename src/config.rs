// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::decision::{AppFilter, Policy};
use crate::error::{Error, Result};
use crate::wait::Timeouts;
use directories::{BaseDirs, ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config file version. Increment when making breaking changes.
const CONFIG_VERSION: u32 = 1;

/// File name the console gives the production push certificate download.
pub const DOWNLOADED_CERT_NAME: &str = "aps_production_identity.cer";

/// Catalog page of the developer console.
pub const DEFAULT_CONSOLE_URL: &str = "https://developer.apple.com/ios/manage/bundles/index.action";

#[derive(Serialize, Deserialize)]
pub struct Config {
    /// Config file version for future migration support
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    /// Console account name; also the subject of the signing request
    #[serde(default)]
    pub user: String,
    /// Console password. Prefer PUSHCERT_PASSWORD or the interactive prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Name of the scratch keychain recreated for every app
    #[serde(default = "default_keychain")]
    pub keychain: String,
    /// Directory the browser saves downloads into
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Directory receiving one `<app id>.pem` per processed app
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,
    /// Team picked when the console asks for one
    #[serde(default)]
    pub team: String,
    /// Issue a new certificate for apps that are already enabled
    #[serde(default)]
    pub refresh_certs: bool,
    /// Only apps whose identifier ends with this suffix are processed
    #[serde(default)]
    pub app_filter: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_console_url")]
    pub console_url: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("config_version", &self.config_version)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keychain", &self.keychain)
            .field("download_dir", &self.download_dir)
            .field("cert_dir", &self.cert_dir)
            .field("team", &self.team)
            .field("refresh_certs", &self.refresh_certs)
            .field("app_filter", &self.app_filter)
            .field("country_code", &self.country_code)
            .field("console_url", &self.console_url)
            .field("webdriver_url", &self.webdriver_url)
            .field("browser", &self.browser)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_keychain() -> String {
    "pushcert".to_string()
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("certs")
}

fn default_country_code() -> String {
    "US".to_string()
}

fn default_console_url() -> String {
    DEFAULT_CONSOLE_URL.to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_browser() -> String {
    "chrome".to_string()
}

/// Wait limits, in seconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Ordinary page transitions
    #[serde(default = "default_page_secs")]
    pub page_secs: u64,
    /// Remote certificate generation
    #[serde(default = "default_issuance_secs")]
    pub issuance_secs: u64,
    /// Downloaded certificate appearing on disk
    #[serde(default = "default_download_secs")]
    pub download_secs: u64,
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_millis")]
    pub poll_millis: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_secs: default_page_secs(),
            issuance_secs: default_issuance_secs(),
            download_secs: default_download_secs(),
            poll_millis: default_poll_millis(),
        }
    }
}

fn default_page_secs() -> u64 {
    30
}

fn default_issuance_secs() -> u64 {
    180
}

fn default_download_secs() -> u64 {
    120
}

fn default_poll_millis() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            user: String::new(),
            password: None,
            keychain: default_keychain(),
            download_dir: default_download_dir(),
            cert_dir: default_cert_dir(),
            team: String::new(),
            refresh_certs: false,
            app_filter: String::new(),
            country_code: default_country_code(),
            console_url: default_console_url(),
            webdriver_url: default_webdriver_url(),
            browser: default_browser(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
    pub config: PathBuf,
    pub rsa_key: PathBuf,
    pub csr: PathBuf,
    pub p12: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        Ok(Self::with_base(Self::base_dir()?))
    }

    /// Lay out the well-known files under an explicit base directory.
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config: base.join("config.toml"),
            rsa_key: base.join("push_notification.key"),
            csr: base.join("CertificateSigningRequest.certSigningRequest"),
            p12: base.join("out.p12"),
            base,
        }
    }

    fn base_dir() -> Result<PathBuf> {
        if let Ok(custom_root) = std::env::var("PUSHCERT_ROOT") {
            let path = PathBuf::from(&custom_root);

            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "PUSHCERT_ROOT must be an absolute path, got: {}",
                    custom_root
                )));
            }

            return Ok(path);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "pushcert") {
            Ok(proj_dirs.data_dir().to_path_buf())
        } else if let Some(base_dirs) = BaseDirs::new() {
            Ok(base_dirs.home_dir().join(".pushcert"))
        } else {
            eprintln!("Warning: Could not determine home directory, using /tmp/.pushcert");
            eprintln!(
                "         Set PUSHCERT_ROOT environment variable to specify a custom location."
            );
            Ok(PathBuf::from("/tmp/.pushcert"))
        }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        crate::fs::ensure_dir(&self.base)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.config_version > CONFIG_VERSION {
            eprintln!(
                "Warning: config.toml version {} is newer than supported version {}.",
                self.config_version, CONFIG_VERSION
            );
            eprintln!("         Some settings may not be recognized. Consider upgrading pushcert.");
        }

        if self.user.trim().is_empty() {
            return Err(Error::Config("user must be set".into()));
        }

        if self.keychain.trim().is_empty() {
            return Err(Error::Config("keychain cannot be empty".into()));
        }
        if self.keychain.contains('/') || self.keychain.contains('\\') {
            return Err(Error::Config(
                "keychain must be a name, not a path".into(),
            ));
        }

        if self.country_code.len() != 2
            || !self.country_code.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "country_code must be two letters, got '{}'",
                self.country_code
            )));
        }

        let t = &self.timeouts;
        if t.page_secs == 0 || t.issuance_secs == 0 || t.download_secs == 0 {
            return Err(Error::Config("timeouts must be at least 1 second".into()));
        }
        if t.poll_millis == 0 || t.poll_millis >= t.page_secs * 1000 {
            return Err(Error::Config(
                "timeouts.poll_millis must be positive and below timeouts.page_secs".into(),
            ));
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        crate::fs::atomic_write(path, content.as_bytes())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            page: Duration::from_secs(self.timeouts.page_secs),
            issuance: Duration::from_secs(self.timeouts.issuance_secs),
            download: Duration::from_secs(self.timeouts.download_secs),
            poll: Duration::from_millis(self.timeouts.poll_millis),
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            refresh_existing: self.refresh_certs,
            filter: AppFilter::suffix(self.app_filter.clone()),
        }
    }

    /// Where the browser drops the production certificate.
    pub fn downloaded_cert_path(&self) -> PathBuf {
        self.download_dir.join(DOWNLOADED_CERT_NAME)
    }
}
