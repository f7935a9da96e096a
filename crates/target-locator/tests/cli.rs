use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use target_locator::LocatorConfig;

fn cli() -> Command {
    Command::cargo_bin("target-locator").expect("binary built")
}

#[test]
fn default_config_round_trips() {
    let out = cli().arg("default-config").assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    let cfg: LocatorConfig = serde_json::from_str(&stdout).expect("config json");
    cfg.validate().expect("valid");
    assert_eq!(cfg.debug_period, 30);
}

#[test]
fn synth_then_detect_finds_the_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = dir.path().join("frame.png");
    let annotated = dir.path().join("annotated.png");
    let mask = dir.path().join("mask.png");

    cli()
        .args(["synth", "--out"])
        .arg(&frame)
        .args(["--x", "3.0", "--y", "0.4", "--z", "-0.3"])
        .assert()
        .success();
    assert!(frame.exists());

    let out = cli()
        .args(["detect", "--yaw", "10", "--image"])
        .arg(&frame)
        .arg("--annotated")
        .arg(&annotated)
        .arg("--mask")
        .arg(&mask)
        .assert()
        .success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    let reading: Value = serde_json::from_str(stdout.trim()).expect("reading json");
    assert_eq!(reading["found"], true);
    let distance = reading["distance"].as_f64().expect("distance");
    assert!((distance - 3.0_f64.hypot(0.4)).abs() < 0.15, "distance {distance}");
    assert!(annotated.exists());
    assert!(mask.exists());
}

#[test]
fn run_replays_directory_as_json_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).expect("mkdir");
    image::RgbImage::new(64, 48)
        .save(frames.join("000.png"))
        .expect("save");

    cli()
        .args(["run", "--frames"])
        .arg(&frames)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"found\":false"));
}

#[test]
fn run_writes_debug_images() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames = dir.path().join("frames");
    let debug = dir.path().join("debug");
    std::fs::create_dir(&frames).expect("mkdir");
    image::RgbImage::new(64, 48)
        .save(frames.join("000.png"))
        .expect("save");

    cli()
        .args(["run", "--frames"])
        .arg(&frames)
        .arg("--debug-dir")
        .arg(&debug)
        .assert()
        .success();
    assert!(debug.join("000001_thresh.png").exists());
}

#[test]
fn missing_frames_directory_fails() {
    cli()
        .args(["run", "--frames", "/nonexistent/frames"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "debug_period": 0 }"#).expect("write");
    cli()
        .args(["detect", "--image", "unused.png", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("debug_period"));
}

#[test]
fn log_level_flag_controls_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frame = dir.path().join("frame.png");
    image::RgbImage::new(64, 48).save(&frame).expect("save");

    cli()
        .args(["detect", "--image"])
        .arg(&frame)
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded"));

    cli()
        .args(["--log-level", "warn", "detect", "--image"])
        .arg(&frame)
        .assert()
        .success()
        .stderr(predicate::str::contains("loaded").not());
}

#[test]
fn unknown_log_level_is_rejected() {
    cli()
        .args(["--log-level", "chatty", "default-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chatty"));
}
