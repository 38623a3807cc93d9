// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use greenscreen::Config;
use greenscreen::backends::camera::DeviceSelector;
use greenscreen::errors::ConfigError;
use greenscreen::frame::Hsv;
use greenscreen::media::ContainerFormat;
use greenscreen::pipelines::video::WriteFailurePolicy;
use std::path::PathBuf;

fn config_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("greenscreen-config-{}-{}", name, std::process::id()))
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.chroma_key.lower, Hsv::new(22, 6, 35));
    assert_eq!(config.chroma_key.upper, Hsv::new(85, 255, 255));
    assert_eq!(config.device, DeviceSelector::Index(0));
    assert_eq!(config.write_failure_policy, WriteFailurePolicy::Tolerate);
    assert_eq!(config.container(), Some(ContainerFormat::MP4));
    assert!(config.background.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = config_path("missing");
    let _ = std::fs::remove_file(&path);

    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_save_and_load() {
    let path = config_path("roundtrip");
    let config = Config {
        device: DeviceSelector::Path("/dev/video4".into()),
        background: Some(PathBuf::from("/srv/beach.mp4")),
        write_failure_policy: WriteFailurePolicy::Abort { after: 10 },
        video_container: "mkv".into(),
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();

    assert_eq!(loaded, config);
    assert_eq!(loaded.container(), Some(ContainerFormat::Matroska));
}

#[test]
fn test_hand_written_file() {
    let path = config_path("hand");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{
            "device": 2,
            "capture": { "framerate": 30.0 },
            "write_failure_policy": { "mode": "warn", "after": 5 }
        }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.device, DeviceSelector::Index(2));
    assert_eq!(config.capture.framerate, 30.0);
    assert_eq!(config.capture.width, 864);
    assert_eq!(config.write_failure_policy, WriteFailurePolicy::Warn { after: 5 });
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let path = config_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let path = config_path("invalid");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "capture": { "framerate": 0.0 } }"#).unwrap();

    assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
}
