use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::bitmap::{Orientation, BAR_COUNT, MAX_LEVEL};
use crate::display::protocol::MAX_BRIGHTNESS;
use crate::render::ErrorPolicy;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level settings, mirrors settings.json.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub display: DisplayConfig,
    pub cava: CavaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub gpio_chip: String,          // e.g. "/dev/gpiochip0"
    pub clock_pin: u32,             // BCM numbering
    pub data_pin: u32,
    pub brightness: u8,             // 0-7
    pub mirror: bool,               // swap left/right halves
    pub orientation: Orientation,   // normal | reversed
    pub on_init_error: ErrorPolicy,  // bring-up failure
    pub on_frame_error: ErrorPolicy, // single frame failure
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            gpio_chip: "/dev/gpiochip0".into(),
            clock_pin: 3,
            data_pin: 2,
            brightness: 5,
            mirror: false,
            orientation: Orientation::Normal,
            on_init_error: ErrorPolicy::Halt,
            on_frame_error: ErrorPolicy::LogAndContinue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CavaConfig {
    pub binary: String,             // cava executable
    pub bars: usize,
    pub framerate: u32,
    pub config_path: PathBuf,       // generated cava config
    pub input: CavaInput,
    pub output: CavaOutput,
    pub smoothing: CavaSmoothing,
    /// band -> gain, order kept
    pub eq: serde_json::Map<String, serde_json::Value>,
}

impl Default for CavaConfig {
    fn default() -> Self {
        let eq = (1..=5)
            .map(|band| (band.to_string(), serde_json::Value::from(1)))
            .collect();
        Self {
            binary: "cava".into(),
            bars: BAR_COUNT,
            framerate: 60,
            config_path: PathBuf::from("/tmp/cava_config"),
            input: CavaInput::default(),
            output: CavaOutput::default(),
            smoothing: CavaSmoothing::default(),
            eq,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CavaInput {
    pub method: String,
    pub source: String,
    pub channels: u32,
}

impl Default for CavaInput {
    fn default() -> Self {
        Self { method: "pulse".into(), source: "auto".into(), channels: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CavaOutput {
    pub method: String,
    pub raw_target: String,
    pub data_format: String,
    pub ascii_max_range: u8,
}

impl Default for CavaOutput {
    fn default() -> Self {
        Self {
            method: "raw".into(),
            raw_target: "/dev/stdout".into(),
            data_format: "ascii".into(),
            ascii_max_range: MAX_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CavaSmoothing {
    pub noise_reduction: u32,
    pub monstercat: u32,
    pub waves: u32,
    pub gravity: u32,
    pub ignore: u32,
}

impl Default for CavaSmoothing {
    fn default() -> Self {
        Self { noise_reduction: 77, monstercat: 0, waves: 0, gravity: 100, ignore: 0 }
    }
}

/// CLI overrides, layered over the settings file.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "ledcava", version, about = "LED matrix audio visualizer", disable_help_flag = false)]
pub struct Cli {
    /// Path to a settings file, JSON or YAML (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long, action = ArgAction::Set)]
    pub mirror: Option<bool>,
    #[arg(long, value_parser = parse_orientation)]
    pub orientation: Option<Orientation>,
    /// drive mock lines instead of GPIO
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    match s {
        "normal" => Ok(Orientation::Normal),
        "reversed" => Ok(Orientation::Reversed),
        _ => Err(format!("orientation must be normal|reversed, got {s}")),
    }
}

/// Public entry point: read settings, apply CLI overrides, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) settings file (explicit path or search), defaults otherwise
    let mut cfg = if let Some(p) = cli.config.as_ref() {
        if !p.exists() {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        read_file(p)?
    } else if let Some(p) = find_config_file() {
        read_file(&p)?
    } else {
        Config::default()
    };

    // 2) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 3) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // project local first, matches the historical default
    let p = PathBuf::from("settings.json");
    if p.exists() { return Some(p) }
    // XDG-style: ~/.config/ledcava/settings.json
    if let Some(home) = home_dir() {
        let p = home.join(".config/ledcava/settings.json");
        if p.exists() { return Some(p) }
        let p = home.join(".config/ledcava.yaml");
        if p.exists() { return Some(p) }
    }
    None
}

/// JSON unless the extension says YAML.
pub fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse(&s, is_yaml(path))
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

pub fn parse(s: &str, yaml: bool) -> Result<Config, ConfigError> {
    let cfg = if yaml { serde_yaml::from_str(s)? } else { serde_json::from_str(s)? };
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug                     { cfg.log_level = Some("debug".into()); }
    else if cli.log_level.is_some()  { cfg.log_level = cli.log_level.clone(); }
    if let Some(b) = cli.brightness  { cfg.display.brightness = b; }
    if let Some(m) = cli.mirror      { cfg.display.mirror = m; }
    if let Some(o) = cli.orientation { cfg.display.orientation = o; }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let display = &cfg.display;
    if display.brightness > MAX_BRIGHTNESS {
        return Err(ConfigError::Validation(format!(
            "display brightness must be 0..={MAX_BRIGHTNESS}"
        )));
    }
    if display.clock_pin == display.data_pin {
        return Err(ConfigError::Validation("display clock_pin and data_pin must differ".into()));
    }

    let cava = &cfg.cava;
    if cava.bars != BAR_COUNT {
        return Err(ConfigError::Validation(format!("cava bars must be {BAR_COUNT}")));
    }
    if cava.framerate == 0 {
        return Err(ConfigError::Validation("cava framerate must be > 0".into()));
    }
    if cava.output.method != "raw" || cava.output.data_format != "ascii" {
        return Err(ConfigError::Validation("cava output must be raw ascii".into()));
    }
    if !(1..=MAX_LEVEL).contains(&cava.output.ascii_max_range) {
        return Err(ConfigError::Validation(format!(
            "cava ascii_max_range must be 1..={MAX_LEVEL}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "display": {
            "clock_pin": 21,
            "data_pin": 20,
            "brightness": 3,
            "mirror": true,
            "orientation": "reversed"
        },
        "cava": {
            "bars": 16,
            "framerate": 30,
            "input": { "method": "alsa", "source": "hw:Loopback,1", "channels": 2 },
            "output": { "method": "raw", "raw_target": "/dev/stdout", "data_format": "ascii", "ascii_max_range": 8 },
            "smoothing": { "noise_reduction": 60, "monstercat": 1, "waves": 0, "gravity": 150, "ignore": 0 },
            "eq": { "1": 2, "2": 1.5, "10": 1, "3": 0.5 }
        }
    }"#;

    #[test]
    fn test_parse_json_settings() {
        let cfg = parse(SETTINGS, false).unwrap();
        assert_eq!(cfg.display.clock_pin, 21);
        assert_eq!(cfg.display.brightness, 3);
        assert!(cfg.display.mirror);
        assert_eq!(cfg.display.orientation, Orientation::Reversed);
        assert_eq!(cfg.display.gpio_chip, "/dev/gpiochip0");
        assert_eq!(cfg.cava.framerate, 30);
        assert_eq!(cfg.cava.input.source, "hw:Loopback,1");
        let bands: Vec<&str> = cfg.cava.eq.keys().map(String::as_str).collect();
        assert_eq!(bands, vec!["1", "2", "10", "3"]);
        validate(&cfg).unwrap();
    }

    #[test]
    fn test_parse_yaml_settings() {
        let yaml = "display:\n  brightness: 7\n  on_frame_error: halt\ncava:\n  framerate: 25\n";
        let cfg = parse(yaml, true).unwrap();
        assert_eq!(cfg.display.brightness, 7);
        assert_eq!(cfg.display.on_frame_error, ErrorPolicy::Halt);
        assert_eq!(cfg.cava.framerate, 25);
        assert_eq!(cfg.cava.bars, 16);
    }

    #[test]
    fn test_defaults_validate() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let mut cfg = Config::default();
        cfg.display.brightness = 8;
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        cfg.cava.bars = 32;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.cava.output.ascii_max_range = 255;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.display.data_pin = cfg.display.clock_pin;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.cava.framerate = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut cfg = Config::default();
        let cli = Cli {
            debug: true,
            brightness: Some(1),
            orientation: Some(Orientation::Reversed),
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &cli);
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.display.brightness, 1);
        assert_eq!(cfg.display.orientation, Orientation::Reversed);
        assert!(!cfg.display.mirror);
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["ledcava", "-c", "x.yaml", "--mirror", "true", "--orientation", "reversed", "--dry-run"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        assert_eq!(cli.mirror, Some(true));
        assert_eq!(cli.orientation, Some(Orientation::Reversed));
        assert!(cli.dry_run);
        assert!(Cli::try_parse_from(["ledcava", "--orientation", "sideways"]).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let cli = Cli { config: Some(PathBuf::from("/nonexistent/ledcava.json")), ..Default::default() };
        assert!(matches!(load(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_read_file_by_extension() {
        let dir = std::env::temp_dir().join(format!("ledcava-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let p = dir.join("settings.yml");
        fs::write(&p, "display:\n  mirror: true\n").unwrap();
        let cfg = read_file(&p).unwrap();
        assert!(cfg.display.mirror);
        fs::remove_dir_all(&dir).unwrap();
    }
}
