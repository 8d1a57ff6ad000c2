use clap::{ArgAction, Parser, Subcommand, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::render::ColorDepth;

pub const DEFAULT_API_HOST: &str = "http://localhost:8000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_CLIP_SECONDS: f64 = 2.5;
pub const DEFAULT_AUDIO_CAPACITY: u64 = 16;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub api: Option<ApiConfig>,
    pub view: Option<ViewConfig>,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub zoom: Option<u32>,
    pub debounce_ms: Option<u64>,
    pub depth: Option<ColorDepth>,
    pub clip_seconds: Option<f64>,
}

impl ViewConfig {
    pub fn width(&self) -> u32 { self.width.unwrap_or(800) }
    pub fn height(&self) -> u32 { self.height.unwrap_or(200) }
    pub fn zoom(&self) -> u32 { self.zoom.unwrap_or(1) }
    pub fn debounce_ms(&self) -> u64 { self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS) }
    pub fn depth(&self) -> ColorDepth { self.depth.unwrap_or(ColorDepth::Gray8) }
    pub fn clip_seconds(&self) -> f64 { self.clip_seconds.unwrap_or(DEFAULT_CLIP_SECONDS) }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// decoded audio buffers kept by URL
    pub audio_capacity: Option<u64>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "cochlea-view", version, about = "Sound feature viewer", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(short = 'v', long, alias = "verbose", global = true, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long, global = true)]
    pub api_host: Option<String>,
    #[arg(long, global = true)]
    pub view_width: Option<u32>,
    #[arg(long, global = true)]
    pub view_height: Option<u32>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a sound's feature slice to a PGM image
    Render {
        #[arg(long)]
        sound: String,
        /// "audio" or a feature bot id
        #[arg(long, default_value = "audio")]
        feature: String,
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// seconds; whole sound when omitted
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        zoom: Option<u32>,
        /// fraction of the zoomed width scrolled past the left edge
        #[arg(long, default_value_t = 0.0)]
        pan: f64,
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
    /// Decode a local feature blob and report its shape and timing
    Inspect {
        #[arg(value_hint = ValueHint::FilePath)]
        blob: PathBuf,
    },
    /// List annotations matching a tag query
    Annotations {
        #[arg(long)]
        tags: String,
    },
    /// Write the audio under a clicked time span to a WAV file
    Clip {
        #[arg(long)]
        sound: String,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
}

/// Public entry point: read YAML, merge CLI overrides, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Pretty YAML of effective config (nice for debugging)
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/cochlea/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/cochlea/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/cochlea.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["cochlea.yaml", "config/cochlea.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    match (&mut dst.api, src.api) {
        (None, Some(c)) => dst.api = Some(c),
        (Some(d), Some(s)) => merge_api(d, s),
        _ => {}
    }
    match (&mut dst.view, src.view) {
        (None, Some(c)) => dst.view = Some(c),
        (Some(d), Some(s)) => merge_view(d, s),
        _ => {}
    }
    if src.cache.is_some() { dst.cache = src.cache; }
}

fn merge_api(dst: &mut ApiConfig, src: ApiConfig) {
    if src.host.is_some()               { dst.host = src.host; }
    if src.username.is_some()           { dst.username = src.username; }
    if src.password.is_some()           { dst.password = src.password; }
    if src.timeout_ms.is_some()         { dst.timeout_ms = src.timeout_ms; }
    if src.connect_timeout_ms.is_some() { dst.connect_timeout_ms = src.connect_timeout_ms; }
    if src.page_size.is_some()          { dst.page_size = src.page_size; }
}

fn merge_view(dst: &mut ViewConfig, src: ViewConfig) {
    if src.width.is_some()        { dst.width = src.width; }
    if src.height.is_some()       { dst.height = src.height; }
    if src.zoom.is_some()         { dst.zoom = src.zoom; }
    if src.debounce_ms.is_some()  { dst.debounce_ms = src.debounce_ms; }
    if src.depth.is_some()        { dst.depth = src.depth; }
    if src.clip_seconds.is_some() { dst.clip_seconds = src.clip_seconds; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug {
        cfg.log_level = Some("debug".to_string());
    } else if cli.log_level.is_some() {
        cfg.log_level = cli.log_level.clone();
    }
    if cli.api_host.is_some() {
        cfg.api.get_or_insert_with(ApiConfig::default).host = cli.api_host.clone();
    }
    if cli.view_width.is_some() || cli.view_height.is_some() {
        let view = cfg.view.get_or_insert_with(ViewConfig::default);
        if cli.view_width.is_some()  { view.width = cli.view_width; }
        if cli.view_height.is_some() { view.height = cli.view_height; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(api) = cfg.api.as_ref() {
        if let Some(host) = api.host.as_deref() {
            if !(host.starts_with("http://") || host.starts_with("https://")) {
                return Err(ConfigError::Validation(format!("api host must be http(s): {host}")));
            }
        }
    }
    if let Some(view) = cfg.view.as_ref() {
        if view.width() == 0 || view.height() == 0 {
            return Err(ConfigError::Validation("view width/height must be > 0".into()));
        }
        if !(crate::viewport::MIN_ZOOM..=crate::viewport::MAX_ZOOM).contains(&view.zoom()) {
            return Err(ConfigError::Validation("view zoom must be 1..=20".into()));
        }
        if view.debounce_ms() > 10_000 {
            return Err(ConfigError::Validation("view debounce_ms must be <= 10000".into()));
        }
        if !(view.clip_seconds() > 0.0) {
            return Err(ConfigError::Validation("view clip_seconds must be > 0".into()));
        }
    }
    if let Some(cache) = cfg.cache.as_ref() {
        if cache.audio_capacity == Some(0) {
            return Err(ConfigError::Validation("cache audio_capacity must be > 0".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_and_defaults() {
        let cfg = parse_yaml(
            "log_level: debug\napi:\n  host: https://api.example.com\n  page_size: 50\nview:\n  width: 640\n  depth: gray4\n",
        )
        .unwrap();
        let view = cfg.view.clone().unwrap();
        assert_eq!(view.width(), 640);
        assert_eq!(view.height(), 200);
        assert_eq!(view.depth(), ColorDepth::Gray4);
        assert_eq!(view.debounce_ms(), 100);
        assert_eq!(cfg.api.unwrap().page_size, Some(50));
        assert!(validate(&parse_yaml("view:\n  zoom: 21\n").unwrap()).is_err());
        assert!(validate(&parse_yaml("api:\n  host: ftp://x\n").unwrap()).is_err());
    }

    #[test]
    fn test_merge_and_cli_overrides() {
        let mut cfg = parse_yaml("view:\n  width: 640\n  height: 100\n").unwrap();
        merge(&mut cfg, parse_yaml("view:\n  height: 300\n").unwrap());
        let cli = Cli::parse_from(["cochlea-view", "--view-width", "1024", "--api-host", "http://h:1", "inspect", "x.bin"]);
        apply_cli_overrides(&mut cfg, &cli);
        let view = cfg.view.unwrap();
        assert_eq!(view.width, Some(1024));
        assert_eq!(view.height, Some(300));
        assert_eq!(cfg.api.unwrap().host.as_deref(), Some("http://h:1"));
        assert!(matches!(cli.command, Some(Command::Inspect { .. })));
    }
}
