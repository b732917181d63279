//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{collections::BTreeMap, fmt, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, GlobalOverrides, HighlightArgs, InputArgs, RenderArgs};

use crate::application::render::{DEFAULT_CLEAN_CONTENT_TAGS, DEFAULT_HIGHLIGHT_CLASS};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagemark";
const ENV_PREFIX: &str = "PAGEMARK";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub xss: XssSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// HTML sanitisation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XssSettings {
    pub enabled: bool,
    pub preset: XssPreset,
    pub whitelist: XssWhitelist,
    /// Elements removed together with their content.
    pub clean_content_tags: Vec<String>,
}

impl Default for XssSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: XssPreset::default(),
            whitelist: XssWhitelist::default(),
            clean_content_tags: DEFAULT_CLEAN_CONTENT_TAGS
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XssPreset {
    /// Strip every tag and keep text only.
    IgnoreAllTags,
    #[default]
    Recommended,
    /// Use `xss.whitelist`.
    Custom,
}

impl XssPreset {
    pub fn as_str(self) -> &'static str {
        match self {
            XssPreset::IgnoreAllTags => "ignore-all-tags",
            XssPreset::Recommended => "recommended",
            XssPreset::Custom => "custom",
        }
    }
}

impl fmt::Display for XssPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XssPreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ignore-all-tags" => Ok(XssPreset::IgnoreAllTags),
            "recommended" => Ok(XssPreset::Recommended),
            "custom" => Ok(XssPreset::Custom),
            other => Err(format!(
                "unknown preset `{other}`, expected ignore-all-tags, recommended or custom"
            )),
        }
    }
}

/// Allow-list used by [`XssPreset::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct XssWhitelist {
    pub tags: Vec<String>,
    /// Tag name to attribute names; the `*` key applies to every tag.
    pub attributes: BTreeMap<String, Vec<String>>,
    pub schemes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub highlight_class: String,
    pub page_links: bool,
    pub trace_hooks: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            highlight_class: DEFAULT_HIGHLIGHT_CLASS.to_string(),
            page_links: true,
            trace_hooks: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    xss: RawXssSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.xss_enabled {
            self.xss.enabled = Some(enabled);
        }
        if let Some(preset) = overrides.xss_preset.as_ref() {
            self.xss.preset = Some(preset.clone());
        }
        if let Some(class) = overrides.highlight_class.as_ref() {
            self.render.highlight_class = Some(class.clone());
        }
        if let Some(page_links) = overrides.page_links {
            self.render.page_links = Some(page_links);
        }
        if let Some(trace_hooks) = overrides.trace_hooks {
            self.render.trace_hooks = Some(trace_hooks);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            xss,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            xss: build_xss_settings(xss)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_xss_settings(xss: RawXssSettings) -> Result<XssSettings, LoadError> {
    let preset = match xss.preset {
        Some(preset) => XssPreset::from_str(&preset)
            .map_err(|reason| LoadError::invalid("xss.preset", reason))?,
        None => XssPreset::default(),
    };

    let whitelist = xss.whitelist.unwrap_or_default();
    if preset == XssPreset::Custom && whitelist.tags.iter().all(|tag| tag.trim().is_empty()) {
        return Err(LoadError::invalid(
            "xss.whitelist.tags",
            "custom preset needs at least one allowed tag",
        ));
    }

    let clean_content_tags = xss
        .clean_content_tags
        .unwrap_or_else(|| XssSettings::default().clean_content_tags);

    Ok(XssSettings {
        enabled: xss.enabled.unwrap_or(true),
        preset,
        whitelist,
        clean_content_tags,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let highlight_class = render
        .highlight_class
        .map(|class| class.trim().to_string())
        .unwrap_or_else(|| DEFAULT_HIGHLIGHT_CLASS.to_string());
    if highlight_class.is_empty() {
        return Err(LoadError::invalid(
            "render.highlight_class",
            "class must not be empty",
        ));
    }

    Ok(RenderSettings {
        highlight_class,
        page_links: render.page_links.unwrap_or(true),
        trace_hooks: render.trace_hooks.unwrap_or(false),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawXssSettings {
    enabled: Option<bool>,
    preset: Option<String>,
    whitelist: Option<XssWhitelist>,
    clean_content_tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    highlight_class: Option<String>,
    page_links: Option<bool>,
    trace_hooks: Option<bool>,
}
