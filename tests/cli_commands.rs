mod common;

use common::environment::ImhelperTestEnvironment;
use predicates::prelude::*;

#[test]
fn test_config_path_uses_home() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            env.config_path().display().to_string(),
        ));
}

#[test]
fn test_config_init_then_refuses_overwrite() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    assert!(env.config_path().exists());

    let content = std::fs::read_to_string(env.config_path()).unwrap();
    assert!(content.contains("[helper]"));
    assert!(content.contains("[[input_methods]]"));

    env.imhelper_cmd()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    env.imhelper_cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_reads_file() {
    let env = ImhelperTestEnvironment::new();
    env.write_config(
        r#"
[helper]
socket_path = "/tmp/custom-helper.sock"

[[input_methods]]
name = "skk"
language = "ja"
description = "SKK"
"#,
    );

    env.imhelper_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/custom-helper.sock"))
        .stdout(predicate::str::contains("skk"));

    env.imhelper_cmd()
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"server_command\""));
}

#[test]
fn test_invalid_config_falls_back_to_defaults() {
    let env = ImhelperTestEnvironment::new();
    env.write_config("[logging]\nlevel = \"loud\"\n");

    env.imhelper_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("level = \"info\""));
}

#[test]
fn test_explicit_config_flag() {
    let env = ImhelperTestEnvironment::new();
    let custom = env.home_dir().join("custom.toml");
    std::fs::write(
        &custom,
        "[[input_methods]]\nname = \"pinyin\"\nlanguage = \"zh\"\ndescription = \"Pinyin\"\n",
    )
    .unwrap();

    env.imhelper_cmd()
        .args(["im-list", "--selected", "pinyin", "--config"])
        .arg(&custom)
        .assert()
        .success()
        .stdout(predicate::str::contains("pinyin\tzh\tPinyin\tselected"));
}

#[test]
fn test_im_list_with_default_catalog() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["im-list", "--selected", "direct"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("im_list\ncharset=UTF-8\n"))
        .stdout(predicate::str::contains("direct\t\tDirect input\tselected"));
}

#[test]
fn test_im_list_unknown_selection_fails() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["im-list", "--selected", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown input method"));
}

#[test]
fn test_send_without_daemon_fails() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["send", "focus_in", "--socket"])
        .arg(env.socket_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not reachable"));
}

#[test]
fn test_send_delivers_to_listener() {
    let env = ImhelperTestEnvironment::new();
    let listener = std::os::unix::net::UnixListener::bind(env.socket_path()).unwrap();

    env.imhelper_cmd()
        .args(["send", "prop_update_custom", "anthy-input-mode", "katakana", "--socket"])
        .arg(env.socket_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent prop_update_custom"));

    let (mut stream, _) = listener.accept().unwrap();
    let mut received = String::new();
    std::io::Read::read_to_string(&mut stream, &mut received).unwrap();
    assert_eq!(received, "prop_update_custom\nanthy-input-mode\nkatakana\n\n");
}

#[test]
fn test_watch_rejects_zero_sessions() {
    let env = ImhelperTestEnvironment::new();

    env.imhelper_cmd()
        .args(["watch", "--sessions", "0"])
        .assert()
        .failure();
}
