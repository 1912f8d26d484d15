//! Application configuration structures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CalendarLocale;

/// Environment variable overriding `backend.base_url`.
pub const ENV_BASE_URL: &str = "SITE_BASE";
/// Environment variable overriding `backend.password`.
pub const ENV_PASSWORD: &str = "ADMIN_PASS";
/// Environment variable overriding `source.cookie`.
pub const ENV_SOURCE_COOKIE: &str = "SOURCE_COOKIE";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings shared by source and backend
    #[serde(default)]
    pub http: HttpConfig,

    /// Publication source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Backend (inventory service) settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Pipeline parameters
    #[serde(default)]
    pub sync: SyncConfig,

    /// Attachment acceptance rules
    #[serde(default)]
    pub attachment: AttachmentConfig,

    /// Digest notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Month and weekday names used for dates in titles
    #[serde(default)]
    pub calendar: CalendarLocale,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file does
    /// not exist. A file that exists but cannot be read or parsed is a fatal
    /// configuration error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| AppError::config(format!("{} is invalid: {e}", path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(AppError::config(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Apply environment overrides for values usually kept out of files.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = base;
        }
        if let Some(pass) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.backend.password = pass;
        }
        if let Some(cookie) = lookup(ENV_SOURCE_COOKIE).filter(|v| !v.is_empty()) {
            self.source.cookie = Some(cookie);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.sync.retention_count == 0 {
            return Err(AppError::validation("sync.retention_count must be > 0"));
        }
        if self.sync.max_items_per_run == 0 {
            return Err(AppError::validation("sync.max_items_per_run must be > 0"));
        }
        if self.sync.item_timeout_secs == 0 {
            return Err(AppError::validation("sync.item_timeout_secs must be > 0"));
        }
        if self.attachment.signature.is_empty() {
            return Err(AppError::validation("attachment.signature is empty"));
        }
        if self.attachment.max_bytes <= self.attachment.min_bytes {
            return Err(AppError::validation(
                "attachment.max_bytes must be > attachment.min_bytes",
            ));
        }
        if !self.notify.template.contains("{title}") {
            return Err(AppError::validation(
                "notify.template must contain {title}",
            ));
        }
        self.calendar.validate()?;
        Ok(())
    }

    /// Check everything a run needs before touching the network.
    ///
    /// Failures here are fatal: nothing is fetched and nothing is marked seen.
    pub fn ensure_runnable(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(AppError::config(format!(
                "backend.base_url is not set (config file or {ENV_BASE_URL})"
            )));
        }
        url::Url::parse(&self.backend.base_url).map_err(|e| {
            AppError::config(format!(
                "backend.base_url '{}' is invalid: {e}",
                self.backend.base_url
            ))
        })?;
        if self.backend.password.is_empty() {
            return Err(AppError::config(format!(
                "backend.password is not set (config file or {ENV_PASSWORD})"
            )));
        }
        url::Url::parse(&self.source.listing_url).map_err(|e| {
            AppError::config(format!(
                "source.listing_url '{}' is invalid: {e}",
                self.source.listing_url
            ))
        })?;
        self.validate().map_err(|e| AppError::config(e.to_string()))
    }

    /// Resolve the ledger file against a base directory.
    pub fn ledger_path(&self, base: &Path) -> PathBuf {
        base.join(&self.paths.ledger_file)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Publication source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page listing the announcements
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Links matching this pattern are announcement pages
    #[serde(default = "defaults::item_link_pattern")]
    pub item_link_pattern: String,

    /// Title used when an announcement page has no heading
    #[serde(default = "defaults::fallback_title")]
    pub fallback_title: String,

    /// Cookie header sent with every source request
    #[serde(default)]
    pub cookie: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
            item_link_pattern: defaults::item_link_pattern(),
            fallback_title: defaults::fallback_title(),
            cookie: None,
        }
    }
}

/// Backend admin API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the admin API directory (e.g. `https://host/api`)
    #[serde(default)]
    pub base_url: String,

    /// Admin password sent with every call
    #[serde(default, skip_serializing)]
    pub password: String,
}

/// What to do with a title that carries no recognizable date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDatePolicy {
    /// Treat the item as fresh; title filtering still applies
    #[default]
    AssumeFresh,
    /// Treat the item as stale
    Reject,
}

/// Which state sources the dedup gate consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStrategy {
    #[serde(default = "defaults::enabled")]
    pub by_ledger: bool,
    #[serde(default = "defaults::enabled")]
    pub by_remote_title: bool,
    #[serde(default = "defaults::enabled")]
    pub by_remote_url: bool,
}

impl Default for DedupStrategy {
    fn default() -> Self {
        Self {
            by_ledger: true,
            by_remote_title: true,
            by_remote_url: true,
        }
    }
}

/// Pipeline parameters. Each historical pipeline variant is one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Titles must match this (case-insensitive)
    #[serde(default = "defaults::relevance_pattern")]
    pub relevance_pattern: String,

    /// Titles matching this are rejected (case-insensitive)
    #[serde(default = "defaults::exclusion_pattern")]
    pub exclusion_pattern: String,

    /// Maximum age in days of the date found in a title
    #[serde(default = "defaults::freshness_window_days")]
    pub freshness_window_days: i64,

    /// Handling of titles without a date
    #[serde(default)]
    pub missing_date_policy: MissingDatePolicy,

    /// Render `<weekday> - <day> <month>` titles when a date resolves
    #[serde(default = "defaults::enabled")]
    pub canonical_titles: bool,

    /// Records kept in the backend after retention (MAX_KEEP)
    #[serde(default = "defaults::retention_count")]
    pub retention_count: usize,

    /// Unseen references detailed per run
    #[serde(default = "defaults::max_items_per_run")]
    pub max_items_per_run: usize,

    /// Time budget for one item, from detail fetch to register
    #[serde(default = "defaults::item_timeout")]
    pub item_timeout_secs: u64,

    #[serde(default)]
    pub dedup: DedupStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            relevance_pattern: defaults::relevance_pattern(),
            exclusion_pattern: defaults::exclusion_pattern(),
            freshness_window_days: defaults::freshness_window_days(),
            missing_date_policy: MissingDatePolicy::default(),
            canonical_titles: true,
            retention_count: defaults::retention_count(),
            max_items_per_run: defaults::max_items_per_run(),
            item_timeout_secs: defaults::item_timeout(),
            dedup: DedupStrategy::default(),
        }
    }
}

/// Attachment acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// Anything smaller is an error page, not a document
    #[serde(default = "defaults::min_bytes")]
    pub min_bytes: usize,

    /// Upper bound on what is uploaded
    #[serde(default = "defaults::max_bytes")]
    pub max_bytes: usize,

    /// Expected leading bytes
    #[serde(default = "defaults::signature")]
    pub signature: String,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            min_bytes: defaults::min_bytes(),
            max_bytes: defaults::max_bytes(),
            signature: defaults::signature(),
        }
    }
}

/// Digest notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Message template, `{title}` is replaced with the published title
    #[serde(default = "defaults::notify_template")]
    pub template: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: defaults::notify_template(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Print the end-of-run summary block
    #[serde(default = "defaults::enabled")]
    pub show_summary: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_summary: true,
        }
    }
}

/// File locations, relative to the working directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::ledger_file")]
    pub ledger_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger_file: defaults::ledger_file(),
        }
    }
}

mod defaults {
    pub fn enabled() -> bool {
        true
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; schedule-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Source defaults
    pub fn listing_url() -> String {
        "https://t15.ecp.egov66.ru/dashboard".into()
    }
    pub fn item_link_pattern() -> String {
        r"/news/show/\d+$".into()
    }
    pub fn fallback_title() -> String {
        "Изменение".into()
    }

    // Pipeline defaults
    pub fn relevance_pattern() -> String {
        r"изменени[яе]\s+в\s+расписани[ие]".into()
    }
    pub fn exclusion_pattern() -> String {
        "экзамен|экзаменац|сесс(ия|ии)|олимпиад|конкурс".into()
    }
    pub fn freshness_window_days() -> i64 {
        3
    }
    pub fn retention_count() -> usize {
        3
    }
    pub fn max_items_per_run() -> usize {
        5
    }
    pub fn item_timeout() -> u64 {
        90
    }

    // Attachment defaults
    pub fn min_bytes() -> usize {
        1024
    }
    pub fn max_bytes() -> usize {
        20 * 1024 * 1024
    }
    pub fn signature() -> String {
        "%PDF-".into()
    }

    pub fn notify_template() -> String {
        "🔔 Новое изменение!\n{title}".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn ledger_file() -> String {
        "seen.json".into()
    }
}
