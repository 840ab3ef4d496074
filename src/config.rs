//! Configuration loading for tracker defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracker_core::{
    DEFAULT_BUFFER_WINDOW, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CONSECUTIVE_FAILURES,
    DEFAULT_PREFERRED_LANGUAGE, DEFAULT_LOOKUP_DELAY, DEFAULT_SWEEP_INTERVAL, DiscoveryPolicy,
    EpisodeUrlPattern, FetchConfig, PipelineOptions,
};

/// Site the tracker follows when none is configured.
pub const DEFAULT_SITE_BASE_URL: &str = "https://watchanimeworld.net";

/// Database file used when none is configured.
pub const DEFAULT_DATABASE_FILE: &str = "episode-tracker.db";

/// Environment variable holding the egress proxy URL.
pub const PROXY_ENV_VAR: &str = "TRACKER_PROXY_URL";

/// Key = value file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Site root used for episode URLs and the `Referer` header.
    pub site_base_url: Option<String>,
    /// Egress proxy for every fetch.
    pub proxy_url: Option<String>,
    /// Per-request timeout in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Pause after each networked lookup in milliseconds.
    pub lookup_delay_ms: Option<u64>,
    /// Hours between scheduled sweeps.
    pub sweep_interval_hours: Option<u64>,
    /// Probing horizon when the series length is unknown.
    pub buffer_window: Option<u32>,
    /// Consecutive misses that end an entry's probing.
    pub max_consecutive_failures: Option<u32>,
    /// Payload language picked when present.
    pub preferred_language: Option<String>,
    /// `SQLite` database file.
    pub database_path: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = self.site_base_url.as_deref()
            && !(base.starts_with("http://") || base.starts_with("https://"))
        {
            bail!("Invalid config value for `site_base_url`: '{base}'. Expected an http(s) URL");
        }
        if let Some(proxy) = self.proxy_url.as_deref()
            && proxy.trim().is_empty()
        {
            bail!("Invalid config value for `proxy_url`: expected a non-empty URL");
        }
        validate_range("fetch_timeout_secs", self.fetch_timeout_secs, 1, 300)?;
        validate_range("lookup_delay_ms", self.lookup_delay_ms, 0, 60_000)?;
        validate_range("sweep_interval_hours", self.sweep_interval_hours, 1, 168)?;
        validate_range("buffer_window", self.buffer_window.map(u64::from), 1, 500)?;
        validate_range(
            "max_consecutive_failures",
            self.max_consecutive_failures.map(u64::from),
            1,
            50,
        )?;
        if let Some(language) = self.preferred_language.as_deref()
            && language.trim().is_empty()
        {
            bail!("Invalid config value for `preferred_language`: expected a non-empty label");
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path that was consulted, if one could be determined.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/episode-tracker/config.toml`
/// 2. `$HOME/.config/episode-tracker/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("episode-tracker")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("episode-tracker")
            .join("config.toml"),
    )
}

fn env_var_non_empty(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` if given (it must exist), else the default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "site_base_url" => {
                cfg.site_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "proxy_url" => {
                cfg.proxy_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "preferred_language" => {
                cfg.preferred_language = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "database_path" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.database_path = Some(PathBuf::from(parsed));
            }
            "fetch_timeout_secs" => {
                cfg.fetch_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "lookup_delay_ms" => {
                cfg.lookup_delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "sweep_interval_hours" => {
                cfg.sweep_interval_hours = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "buffer_window" => {
                cfg.buffer_window = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "max_consecutive_failures" => {
                cfg.max_consecutive_failures =
                    Some(parse_integer_u32(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

/// Values given on the command line; they win over the environment and the file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// `--db`
    pub database_path: Option<PathBuf>,
    /// `--proxy`
    pub proxy_url: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub site_base_url: String,
    pub proxy_url: Option<String>,
    pub fetch_timeout: Duration,
    pub lookup_delay: Duration,
    pub sweep_interval: Duration,
    pub buffer_window: u32,
    pub max_consecutive_failures: u32,
    pub preferred_language: String,
    pub database_path: PathBuf,
}

impl TrackerSettings {
    /// Merges CLI overrides, the proxy environment variable and the file config
    /// over built-in defaults, in that order of precedence.
    #[must_use]
    pub fn resolve(
        file: Option<&FileConfig>,
        overrides: &SettingsOverrides,
        env_proxy: Option<String>,
    ) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            site_base_url: file
                .site_base_url
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SITE_BASE_URL.to_string()),
            proxy_url: overrides
                .proxy_url
                .clone()
                .or(env_proxy.filter(|p| !p.trim().is_empty()))
                .or(file.proxy_url),
            fetch_timeout: file
                .fetch_timeout_secs
                .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_secs),
            lookup_delay: file
                .lookup_delay_ms
                .map_or(DEFAULT_LOOKUP_DELAY, Duration::from_millis),
            sweep_interval: file
                .sweep_interval_hours
                .map_or(DEFAULT_SWEEP_INTERVAL, |hours| {
                    Duration::from_secs(hours.saturating_mul(60 * 60))
                }),
            buffer_window: file.buffer_window.unwrap_or(DEFAULT_BUFFER_WINDOW),
            max_consecutive_failures: file
                .max_consecutive_failures
                .unwrap_or(DEFAULT_MAX_CONSECUTIVE_FAILURES),
            preferred_language: file
                .preferred_language
                .unwrap_or_else(|| DEFAULT_PREFERRED_LANGUAGE.to_string()),
            database_path: overrides
                .database_path
                .clone()
                .or(file.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE)),
        }
    }

    /// Reads the proxy environment variable.
    #[must_use]
    pub fn proxy_from_env() -> Option<String> {
        env::var(PROXY_ENV_VAR).ok()
    }

    /// Network policy for the fetch guard.
    #[must_use]
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: self.fetch_timeout,
            proxy_url: self.proxy_url.clone(),
            referer: format!("{}/", self.site_base_url),
            ..FetchConfig::default()
        }
    }

    /// Strategy tunables.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            preferred_language: self.preferred_language.clone(),
            ..PipelineOptions::default()
        }
    }

    /// Probing limits.
    #[must_use]
    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        DiscoveryPolicy {
            buffer_window: self.buffer_window,
            max_consecutive_failures: self.max_consecutive_failures,
            lookup_delay: self.lookup_delay,
        }
    }

    /// Episode page URLs on the configured site.
    pub fn url_pattern(&self) -> Result<EpisodeUrlPattern> {
        let template = format!("{}/episode/{{slug}}-{{season}}x{{episode}}/", self.site_base_url);
        EpisodeUrlPattern::new(template).context("Invalid `site_base_url` for episode URLs")
    }
}
