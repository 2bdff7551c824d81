use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;

mod common;

use common::{parse_json, seed_cache, write_config};

const PROPERTIES: &str = "# generated\nlibs-folder=libs\nrelocation-prefix=my.plugin.libs\n";
const DEPENDENCIES: &str = "# runtime libraries\ncom.example:lib:1.0\n\ncom.example:other:2.1\n";

#[test]
fn cached_dependencies_are_reported_in_declaration_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config");
    let data = temp.path().join("data");
    write_config(&config, PROPERTIES, DEPENDENCIES, "");
    seed_cache(&data.join("libs"), "com.example.lib-1.0.jar");
    seed_cache(&data.join("libs"), "com.example.other-2.1.jar");

    let assert = cargo_bin_cmd!("zap")
        .env_remove("ZAP_CACHE_PATH")
        .env_remove("ZAP_LIBRARY_LOADER")
        .env("ZAP_ONLINE", "0")
        .args(["resolve", "--json", "--config"])
        .arg(&config)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["loader"], "generic (path-report)");
    assert_eq!(payload["details"]["relocation_prefix"], "my.plugin.libs");
    let reported: Vec<&str> = payload["details"]["reported"]
        .as_array()
        .expect("reported paths")
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert_eq!(reported.len(), 2);
    assert!(reported[0].ends_with("com.example.lib-1.0.jar"));
    assert!(reported[1].ends_with("com.example.other-2.1.jar"));
    let deps = payload["details"]["dependencies"].as_array().expect("deps");
    assert_eq!(deps[0]["coordinate"], "com.example:lib:1.0");
    assert_eq!(deps[0]["state"], "staged");
    assert_eq!(deps[0]["cache_hit"], true);
}

#[test]
fn loader_manifest_receives_each_path_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config");
    let data = temp.path().join("data");
    let manifest = temp.path().join("loader.txt");
    write_config(&config, PROPERTIES, "com.example:lib:1.0\n", "");
    seed_cache(&data.join("libs"), "com.example.lib-1.0.jar");

    for _ in 0..2 {
        cargo_bin_cmd!("zap")
            .env_remove("ZAP_CACHE_PATH")
            .env("ZAP_LIBRARY_LOADER", &manifest)
            .args(["resolve", "--offline", "-q", "--config"])
            .arg(&config)
            .arg("--data-dir")
            .arg(&data)
            .assert()
            .success();
    }

    let contents = fs::read_to_string(&manifest).expect("manifest");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("com.example.lib-1.0.jar"));
}

#[test]
fn offline_without_cache_is_degraded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config");
    write_config(&config, PROPERTIES, "com.example:lib:1.0\n", "https://repo.example/maven\n");

    let assert = cargo_bin_cmd!("zap")
        .env_remove("ZAP_CACHE_PATH")
        .env_remove("ZAP_LIBRARY_LOADER")
        .args(["resolve", "--offline", "--json", "--config"])
        .arg(&config)
        .arg("--data-dir")
        .arg(temp.path())
        .assert()
        .code(1);

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "degraded");
    let reason = payload["details"]["reason"].as_str().expect("reason");
    assert!(reason.contains("com.example:lib:1.0"));
    assert!(reason.contains("https://repo1.maven.org/maven2/"));
    assert!(reason.contains("https://repo.example/maven/"));
    assert!(!temp.path().join("libs/com.example.lib-1.0.jar").exists());
}

#[test]
fn missing_properties_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");

    let assert = cargo_bin_cmd!("zap")
        .args(["resolve", "--json", "--config"])
        .arg(temp.path())
        .assert()
        .code(2);

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "error");
    assert!(payload["message"]
        .as_str()
        .expect("message")
        .contains("zapper.properties"));
}

#[test]
fn relocation_without_relocator_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config");
    let data = temp.path().join("data");
    write_config(&config, PROPERTIES, "com.example:lib:1.0\n", "");
    fs::write(config.join("relocations.txt"), "com.example:my.plugin.libs.example\n")
        .expect("relocations");
    seed_cache(&data.join("libs"), "com.example.lib-1.0.jar");

    let assert = cargo_bin_cmd!("zap")
        .env_remove("ZAP_CACHE_PATH")
        .env_remove("ZAP_LIBRARY_LOADER")
        .args(["resolve", "--offline", "--json", "--config"])
        .arg(&config)
        .arg("--data-dir")
        .arg(&data)
        .assert()
        .code(2);

    let payload = parse_json(&assert);
    assert!(payload["message"]
        .as_str()
        .expect("message")
        .contains("no relocator is configured"));
}
