#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::assert::Assert;
use serde_json::Value;

pub const JAR: &[u8] = b"PK\x03\x04 cached library";

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

/// Writes a declared configuration directory.
pub fn write_config(dir: &Path, properties: &str, dependencies: &str, repositories: &str) {
    fs::create_dir_all(dir).expect("config dir");
    fs::write(dir.join("zapper.properties"), properties).expect("properties");
    fs::write(dir.join("dependencies.txt"), dependencies).expect("dependencies");
    fs::write(dir.join("repositories.txt"), repositories).expect("repositories");
}

/// Seeds the libs folder so resolution never needs the network.
pub fn seed_cache(libs: &Path, file_name: &str) {
    fs::create_dir_all(libs).expect("libs dir");
    fs::write(libs.join(file_name), JAR).expect("seed jar");
}
