// intercut-core/tests/config_tests.rs

use intercut_core::config::{CoreConfig, CoreConfigBuilder, DEFAULT_QUALITY};
use std::env;
use std::path::PathBuf;

const VARS: &[&str] = &[
    "INTERCUT_FFMPEG",
    "INTERCUT_FFPROBE",
    "INTERCUT_QUALITY",
    "INTERCUT_PRESET",
    "INTERCUT_SOFTWARE_ONLY",
];

fn clear_vars() {
    for var in VARS {
        // SAFETY: this test binary has a single test touching the environment.
        unsafe { env::remove_var(var) };
    }
}

#[test]
fn test_env_var_overrides() {
    clear_vars();

    let defaults = CoreConfig::new();
    assert_eq!(defaults.tuning.quality, DEFAULT_QUALITY);
    assert!(!defaults.software_only);
    assert!(defaults.validate().is_ok());

    // SAFETY: see clear_vars.
    unsafe {
        env::set_var("INTERCUT_FFMPEG", "/opt/ffmpeg/bin/ffmpeg");
        env::set_var("INTERCUT_FFPROBE", "/opt/ffmpeg/bin/ffprobe");
        env::set_var("INTERCUT_QUALITY", "28");
        env::set_var("INTERCUT_PRESET", "veryfast");
        env::set_var("INTERCUT_SOFTWARE_ONLY", "true");
    }

    let config = CoreConfig::new();
    assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    assert_eq!(config.ffprobe_path, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
    assert_eq!(config.tuning.quality, 28);
    assert_eq!(config.tuning.preset, "veryfast");
    assert!(config.software_only);

    // Builder values win over the environment.
    let built = CoreConfigBuilder::new()
        .quality(20)
        .software_only(false)
        .build()
        .unwrap();
    assert_eq!(built.tuning.quality, 20);
    assert!(!built.software_only);

    // SAFETY: see clear_vars.
    unsafe { env::set_var("INTERCUT_QUALITY", "not-a-number") };
    assert_eq!(CoreConfig::new().tuning.quality, DEFAULT_QUALITY);

    clear_vars();
}
