//! Startup configuration.
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. the named preset (`preset` in the file, or `WEBCAM_OSC_PRESET`)
//! 3. values from the config file (JSON, or TOML for `.toml` paths)
//! 4. `WEBCAM_OSC_*` environment variables
//! 5. command-line overrides (`AppConfig::with_overrides`)
//!
//! The result is validated once and never mutated afterwards. Presets are a
//! pure function from one `AppConfig` to another.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analyze::{AnalyzerSettings, DominantMode};
use crate::error::{Error, Result};
use crate::grid::GridShape;
use crate::ingest::{CaptureConfig, SourceSpec};
use crate::osc::{check_bundle_fits, Endpoint, MAX_UDP_PAYLOAD};
use crate::runtime::{LoopOptions, DEFAULT_REPORT_INTERVAL};

const DEFAULT_SOURCE: &str = "/dev/video0";
const DEFAULT_OSC_HOST: &str = "127.0.0.1";
const DEFAULT_OSC_PORT: u16 = 5005;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const MAX_FPS: u32 = 240;

/// Available presets with a one-line description.
pub const PRESETS: [(&str, &str); 3] = [
    ("performance", "320x240 capture, coarse dominant-color sampling"),
    ("balanced", "640x480 capture, default analysis"),
    ("quality", "1280x720 capture, exact most-frequent dominant color"),
];

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osc: Option<OscConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisConfigFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_datagram_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OscConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfigFile {
    pub rows: Option<u32>,
    pub cols: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfigFile {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfigFile {
    pub contrast_scale: Option<f32>,
    pub dominant_mode: Option<DominantMode>,
    pub dominant_sample: Option<u32>,
}

/// Fully resolved, validated configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub source: String,
    pub capture: CaptureConfig,
    pub grid: GridShape,
    pub osc: Endpoint,
    pub analysis: AnalyzerSettings,
    pub report_interval: u64,
    pub max_datagram_bytes: usize,
    pub max_frames: Option<u64>,
    /// Last preset applied, for reporting.
    pub preset: Option<String>,
}

/// Command-line values layered over a loaded config.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub preset: Option<String>,
    pub source: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grid: Option<GridShape>,
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_frames: Option<u64>,
    pub report_interval: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            capture: CaptureConfig {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                target_fps: DEFAULT_FPS,
            },
            grid: GridShape::default(),
            osc: Endpoint::new(DEFAULT_OSC_HOST, DEFAULT_OSC_PORT),
            analysis: AnalyzerSettings::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            max_datagram_bytes: MAX_UDP_PAYLOAD,
            max_frames: None,
            preset: None,
        }
    }
}

/// Returns `base` with the named preset applied. `base` is left untouched.
pub fn apply_preset(base: &AppConfig, name: &str) -> Result<AppConfig> {
    let mut cfg = base.clone();
    match name.trim().to_ascii_lowercase().as_str() {
        "performance" => {
            cfg.capture.width = 320;
            cfg.capture.height = 240;
            cfg.analysis.dominant_sample = 5;
            cfg.report_interval = 60;
        }
        "balanced" => {
            cfg.capture.width = 640;
            cfg.capture.height = 480;
        }
        "quality" => {
            cfg.capture.width = 1280;
            cfg.capture.height = 720;
            cfg.analysis.dominant_mode = DominantMode::Mode;
        }
        other => {
            let known: Vec<&str> = PRESETS.iter().map(|(name, _)| *name).collect();
            return Err(Error::config(format!(
                "unknown preset '{}' (available: {})",
                other,
                known.join(", ")
            )));
        }
    }
    cfg.preset = Some(name.trim().to_ascii_lowercase());
    Ok(cfg)
}

impl AppConfig {
    /// Loads `path` (or `WEBCAM_OSC_CONFIG` when `path` is `None`), applies the
    /// environment and validates.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = non_empty_env("WEBCAM_OSC_CONFIG");
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));
        let file_cfg = match path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => AppConfigFile::default(),
        };

        let preset = non_empty_env("WEBCAM_OSC_PRESET").or_else(|| file_cfg.preset.clone());
        let base = match preset.as_deref() {
            Some(name) => apply_preset(&AppConfig::default(), name)?,
            None => AppConfig::default(),
        };

        let mut cfg = base.merge_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validated config from an in-memory file representation, without the environment.
    pub fn from_file(file: AppConfigFile) -> Result<Self> {
        let base = match file.preset.as_deref() {
            Some(name) => apply_preset(&AppConfig::default(), name)?,
            None => AppConfig::default(),
        };
        let cfg = base.merge_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn merge_file(mut self, file: AppConfigFile) -> Result<Self> {
        if let Some(source) = file.source {
            self.source = source;
        }
        if let Some(osc) = file.osc {
            if let Some(host) = osc.host {
                self.osc.host = host;
            }
            if let Some(port) = osc.port {
                self.osc.port = port;
            }
        }
        if let Some(grid) = file.grid {
            self.grid = GridShape::new(
                grid.rows.unwrap_or(self.grid.rows()),
                grid.cols.unwrap_or(self.grid.cols()),
            )?;
        }
        if let Some(capture) = file.capture {
            self.capture.width = capture.width.unwrap_or(self.capture.width);
            self.capture.height = capture.height.unwrap_or(self.capture.height);
            self.capture.target_fps = capture.fps.unwrap_or(self.capture.target_fps);
        }
        if let Some(analysis) = file.analysis {
            if let Some(scale) = analysis.contrast_scale {
                self.analysis.contrast_scale = scale;
            }
            if let Some(mode) = analysis.dominant_mode {
                self.analysis.dominant_mode = mode;
            }
            if let Some(sample) = analysis.dominant_sample {
                self.analysis.dominant_sample = sample;
            }
        }
        if let Some(interval) = file.report_interval {
            self.report_interval = interval;
        }
        if let Some(max) = file.max_datagram_bytes {
            self.max_datagram_bytes = max;
        }
        if file.max_frames.is_some() {
            self.max_frames = file.max_frames;
        }
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = non_empty_env("WEBCAM_OSC_SOURCE") {
            self.source = source;
        }
        if let Some(host) = non_empty_env("WEBCAM_OSC_HOST") {
            self.osc.host = host;
        }
        if let Some(port) = non_empty_env("WEBCAM_OSC_PORT") {
            self.osc.port = port
                .parse()
                .map_err(|_| Error::config("WEBCAM_OSC_PORT must be a port number"))?;
        }
        if let Some(grid) = non_empty_env("WEBCAM_OSC_GRID") {
            self.grid = grid.parse().map_err(|e| {
                Error::config(format!("WEBCAM_OSC_GRID must look like 4x4: {}", e))
            })?;
        }
        if let Some(fps) = non_empty_env("WEBCAM_OSC_FPS") {
            self.capture.target_fps = fps
                .parse()
                .map_err(|_| Error::config("WEBCAM_OSC_FPS must be an integer"))?;
        }
        Ok(())
    }

    /// Applies command-line values on top of `self` and revalidates.
    ///
    /// A CLI preset is applied first, so explicit flags still win over it.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Result<Self> {
        let mut cfg = match overrides.preset.as_deref() {
            Some(name) => apply_preset(self, name)?,
            None => self.clone(),
        };
        if let Some(source) = &overrides.source {
            cfg.source = source.clone();
        }
        if let Some(host) = &overrides.host {
            cfg.osc.host = host.clone();
        }
        if let Some(port) = overrides.port {
            cfg.osc.port = port;
        }
        if let Some(grid) = overrides.grid {
            cfg.grid = grid;
        }
        if let Some(fps) = overrides.fps {
            cfg.capture.target_fps = fps;
        }
        if let Some(width) = overrides.width {
            cfg.capture.width = width;
        }
        if let Some(height) = overrides.height {
            cfg.capture.height = height;
        }
        if overrides.max_frames.is_some() {
            cfg.max_frames = overrides.max_frames;
        }
        if let Some(interval) = overrides.report_interval {
            cfg.report_interval = interval;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        SourceSpec::parse(&self.source)?;
        if self.osc.host.trim().is_empty() {
            return Err(Error::config("osc host must not be empty"));
        }
        if self.osc.port == 0 {
            return Err(Error::config("osc port must be between 1 and 65535"));
        }
        if self.capture.target_fps == 0 || self.capture.target_fps > MAX_FPS {
            return Err(Error::config(format!(
                "target fps must be between 1 and {}, got {}",
                MAX_FPS, self.capture.target_fps
            )));
        }
        self.grid.check_fits(self.capture.width, self.capture.height)?;
        self.analysis.validate()?;
        if self.max_datagram_bytes == 0 || self.max_datagram_bytes > MAX_UDP_PAYLOAD {
            return Err(Error::config(format!(
                "max_datagram_bytes must be between 1 and {}",
                MAX_UDP_PAYLOAD
            )));
        }
        check_bundle_fits(self.grid, self.max_datagram_bytes)?;
        if self.max_frames == Some(0) {
            return Err(Error::config("max_frames must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            target_fps: self.capture.target_fps,
            report_interval: self.report_interval,
            max_frames: self.max_frames,
            max_datagram_bytes: self.max_datagram_bytes,
        }
    }

    /// The effective configuration in file form, pretty-printed as JSON.
    pub fn to_json(&self) -> Result<String> {
        let file = AppConfigFile {
            preset: None,
            source: Some(self.source.clone()),
            osc: Some(OscConfigFile {
                host: Some(self.osc.host.clone()),
                port: Some(self.osc.port),
            }),
            grid: Some(GridConfigFile {
                rows: Some(self.grid.rows()),
                cols: Some(self.grid.cols()),
            }),
            capture: Some(CaptureConfigFile {
                width: Some(self.capture.width),
                height: Some(self.capture.height),
                fps: Some(self.capture.target_fps),
            }),
            analysis: Some(AnalysisConfigFile {
                contrast_scale: Some(self.analysis.contrast_scale),
                dominant_mode: Some(self.analysis.dominant_mode),
                dominant_sample: Some(self.analysis.dominant_sample),
            }),
            report_interval: Some(self.report_interval),
            max_datagram_bytes: Some(self.max_datagram_bytes),
            max_frames: self.max_frames,
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Internal(format!("serialize config: {}", e)))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::config(format!("invalid config file {}: {}", path.display(), e)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> AppConfig {
        AppConfig {
            source: "stub://bars".to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.grid, GridShape::new(4, 4).unwrap());
        assert_eq!(cfg.osc, Endpoint::new("127.0.0.1", 5005));
        assert_eq!(cfg.capture.target_fps, 30);
    }

    #[test]
    fn presets_are_pure() {
        let base = stub_config();
        let quality = apply_preset(&base, "quality").unwrap();
        assert_eq!((quality.capture.width, quality.capture.height), (1280, 720));
        assert_eq!(quality.analysis.dominant_mode, DominantMode::Mode);
        assert_eq!(quality.preset.as_deref(), Some("quality"));

        // The input is unchanged and the function is deterministic.
        assert_eq!(base, stub_config());
        assert_eq!(apply_preset(&base, "quality").unwrap(), quality);

        let perf = apply_preset(&base, "Performance").unwrap();
        assert_eq!((perf.capture.width, perf.capture.height), (320, 240));
        assert_eq!(perf.analysis.dominant_sample, 5);
        assert_eq!(perf.report_interval, 60);
        perf.validate().unwrap();
    }

    #[test]
    fn unknown_preset_is_a_configuration_error() {
        let err = apply_preset(&AppConfig::default(), "cinematic").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("balanced"));
    }

    #[test]
    fn loop_options_carry_the_datagram_limit() {
        let cfg = AppConfig {
            max_datagram_bytes: 1_200,
            ..stub_config()
        };
        let options = cfg.loop_options();
        assert_eq!(options.max_datagram_bytes, 1_200);
        assert_eq!(options.target_fps, cfg.capture.target_fps);
    }

    #[test]
    fn overrides_win_over_preset() {
        let cfg = stub_config()
            .with_overrides(&ConfigOverrides {
                preset: Some("quality".to_string()),
                width: Some(800),
                grid: Some(GridShape::new(3, 8).unwrap()),
                port: Some(9000),
                ..ConfigOverrides::default()
            })
            .unwrap();
        assert_eq!((cfg.capture.width, cfg.capture.height), (800, 720));
        assert_eq!(cfg.grid.to_string(), "3x8");
        assert_eq!(cfg.osc.port, 9000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = stub_config();
        let reject = |overrides: ConfigOverrides| base.with_overrides(&overrides).unwrap_err();

        assert!(matches!(
            reject(ConfigOverrides {
                fps: Some(0),
                ..ConfigOverrides::default()
            }),
            Error::Configuration(_)
        ));
        assert!(matches!(
            reject(ConfigOverrides {
                port: Some(0),
                ..ConfigOverrides::default()
            }),
            Error::Configuration(_)
        ));
        assert!(matches!(
            reject(ConfigOverrides {
                width: Some(2),
                ..ConfigOverrides::default()
            }),
            Error::InvalidGrid { .. }
        ));
        assert!(matches!(
            reject(ConfigOverrides {
                source: Some("rtsp://camera".to_string()),
                ..ConfigOverrides::default()
            }),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn oversized_grid_fails_validation() {
        let err = stub_config()
            .with_overrides(&ConfigOverrides {
                grid: Some(GridShape::new(60, 60).unwrap()),
                ..ConfigOverrides::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("datagram"), "{}", err);
    }

    #[test]
    fn file_values_layer_over_the_file_preset() {
        let file = AppConfigFile {
            preset: Some("performance".to_string()),
            source: Some("stub://split".to_string()),
            capture: Some(CaptureConfigFile {
                height: Some(200),
                ..CaptureConfigFile::default()
            }),
            ..AppConfigFile::default()
        };
        let cfg = AppConfig::from_file(file).unwrap();
        assert_eq!((cfg.capture.width, cfg.capture.height), (320, 200));
        assert_eq!(cfg.analysis.dominant_sample, 5);
        assert_eq!(cfg.source, "stub://split");
    }

    #[test]
    fn json_dump_reloads_to_the_same_config() {
        let cfg = apply_preset(&stub_config(), "quality").unwrap();
        let json = cfg.to_json().unwrap();
        let file: AppConfigFile = serde_json::from_str(&json).unwrap();
        let reloaded = AppConfig::from_file(file).unwrap();
        assert_eq!(reloaded.capture, cfg.capture);
        assert_eq!(reloaded.analysis, cfg.analysis);
        assert_eq!(reloaded.grid, cfg.grid);
    }
}
