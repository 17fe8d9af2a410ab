use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use webcam_osc::config::AppConfig;
use webcam_osc::{DominantMode, Error, GridShape};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "WEBCAM_OSC_CONFIG",
        "WEBCAM_OSC_SOURCE",
        "WEBCAM_OSC_HOST",
        "WEBCAM_OSC_PORT",
        "WEBCAM_OSC_GRID",
        "WEBCAM_OSC_FPS",
        "WEBCAM_OSC_PRESET",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_from_env_path_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "source": "stub://bars",
            "osc": { "host": "10.0.0.5", "port": 9000 },
            "grid": { "rows": 3, "cols": 6 },
            "capture": { "width": 800, "height": 600, "fps": 25 },
            "analysis": { "contrast_scale": 128.0, "dominant_mode": "mode" },
            "report_interval": 90
        }"#,
    );

    std::env::set_var("WEBCAM_OSC_CONFIG", file.path());
    std::env::set_var("WEBCAM_OSC_PORT", "9100");
    std::env::set_var("WEBCAM_OSC_GRID", "2x5");

    let cfg = AppConfig::load(None).expect("load config");

    assert_eq!(cfg.source, "stub://bars");
    assert_eq!(cfg.osc.host, "10.0.0.5");
    assert_eq!(cfg.osc.port, 9100);
    assert_eq!(cfg.grid, GridShape::new(2, 5).unwrap());
    assert_eq!((cfg.capture.width, cfg.capture.height), (800, 600));
    assert_eq!(cfg.capture.target_fps, 25);
    assert_eq!(cfg.analysis.contrast_scale, 128.0);
    assert_eq!(cfg.analysis.dominant_mode, DominantMode::Mode);
    assert_eq!(cfg.report_interval, 90);
    assert_eq!(cfg.preset, None);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let file = write_config(
        ".toml",
        r#"
source = "stub://split"
max_frames = 120

[osc]
port = 7000

[grid]
rows = 8
cols = 8
"#,
    );

    let cfg = AppConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.source, "stub://split");
    assert_eq!(cfg.osc.host, "127.0.0.1");
    assert_eq!(cfg.osc.port, 7000);
    assert_eq!(cfg.grid.to_string(), "8x8");
    assert_eq!(cfg.max_frames, Some(120));

    clear_env();
}

#[test]
fn env_preset_sits_below_file_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let file = write_config(
        ".json",
        r#"{ "preset": "quality", "source": "stub://noise", "capture": { "width": 960 } }"#,
    );
    std::env::set_var("WEBCAM_OSC_PRESET", "performance");

    let cfg = AppConfig::load(Some(file.path())).expect("load config");
    // The environment picks the preset; explicit file values still win over it.
    assert_eq!(cfg.preset.as_deref(), Some("performance"));
    assert_eq!((cfg.capture.width, cfg.capture.height), (960, 240));
    assert_eq!(cfg.analysis.dominant_sample, 5);

    clear_env();
}

#[test]
fn defaults_apply_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("WEBCAM_OSC_SOURCE", "stub://gradient");
    let cfg = AppConfig::load(None).expect("load config");
    assert_eq!(cfg.source, "stub://gradient");
    assert_eq!(cfg.grid, GridShape::new(4, 4).unwrap());
    assert_eq!(cfg.osc.port, 5005);
    assert_eq!(cfg.capture.target_fps, 30);

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("WEBCAM_OSC_PORT", "not-a-port");
    assert!(matches!(AppConfig::load(None), Err(Error::Configuration(_))));
    clear_env();

    std::env::set_var("WEBCAM_OSC_GRID", "4by4");
    assert!(matches!(AppConfig::load(None), Err(Error::Configuration(_))));
    clear_env();

    std::env::set_var("WEBCAM_OSC_FPS", "0");
    assert!(matches!(AppConfig::load(None), Err(Error::Configuration(_))));
    clear_env();

    std::env::set_var("WEBCAM_OSC_PRESET", "cinematic");
    assert!(matches!(AppConfig::load(None), Err(Error::Configuration(_))));
    clear_env();
}

#[test]
fn rejects_bad_files() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let unknown_field = write_config(".json", r#"{ "sourec": "stub://bars" }"#);
    let err = AppConfig::load(Some(unknown_field.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"), "{}", err);

    let too_small = write_config(
        ".json",
        r#"{ "source": "stub://bars", "grid": { "rows": 20, "cols": 20 }, "capture": { "width": 16, "height": 16 } }"#,
    );
    assert!(matches!(
        AppConfig::load(Some(too_small.path())),
        Err(Error::InvalidGrid { .. })
    ));

    let missing = std::env::temp_dir().join("webcam-osc-missing-config.json");
    assert!(matches!(
        AppConfig::load(Some(&missing)),
        Err(Error::Configuration(_))
    ));

    clear_env();
}
