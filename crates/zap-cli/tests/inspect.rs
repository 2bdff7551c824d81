use assert_cmd::cargo::cargo_bin_cmd;
use httptest::{matchers::*, responders::*, Expectation, Server};

mod common;

use common::parse_json;

const ROOT_POM: &str = r"<project>
  <groupId>com.example</groupId>
  <artifactId>app</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency>
      <groupId>${project.groupId}</groupId>
      <artifactId>core</artifactId>
      <version>${project.version}</version>
    </dependency>
    <dependency>
      <groupId>org.junit</groupId>
      <artifactId>junit</artifactId>
      <version>5.0</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>";

const CORE_POM: &str = r"<project>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>2.0.9</version>
      <scope>compile</scope>
    </dependency>
  </dependencies>
</project>";

const LEAF_POM: &str = "<project></project>";

fn serve_pom(server: &Server, path: &str, body: &'static str) {
    server.expect(
        Expectation::matching(request::method_path("GET", format!("/repo/{path}")))
            .respond_with(status_code(200).body(body)),
    );
}

#[test]
fn tree_lists_compile_dependencies_transitively() {
    let server = Server::run();
    serve_pom(&server, "com/example/app/1.0/app-1.0.pom", ROOT_POM);
    serve_pom(&server, "com/example/core/1.0/core-1.0.pom", CORE_POM);
    serve_pom(&server, "org/slf4j/slf4j-api/2.0.9/slf4j-api-2.0.9.pom", LEAF_POM);

    let assert = cargo_bin_cmd!("zap")
        .args(["tree", "com.example:app:1.0", "--no-central", "--json", "--repo"])
        .arg(server.url_str("/repo"))
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "ok");
    assert_eq!(
        payload["details"]["dependencies"],
        serde_json::json!(["com.example:core:1.0", "org.slf4j:slf4j-api:2.0.9"])
    );
    assert_eq!(payload["details"]["scopes"], serde_json::json!(["compile"]));
}

#[test]
fn tree_without_recursion_lists_direct_dependencies_only() {
    let server = Server::run();
    serve_pom(&server, "com/example/app/1.0/app-1.0.pom", ROOT_POM);

    let assert = cargo_bin_cmd!("zap")
        .args([
            "tree",
            "com.example:app:1.0",
            "--no-central",
            "--no-recursive",
            "--scope",
            "test",
            "--json",
            "--repo",
        ])
        .arg(server.url_str("/repo"))
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(
        payload["details"]["dependencies"],
        serde_json::json!(["com.example:core:1.0", "org.junit:junit:5.0"])
    );
}

#[test]
fn tree_reports_missing_descriptor_as_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method("GET")).respond_with(status_code(404)),
    );

    let assert = cargo_bin_cmd!("zap")
        .args(["tree", "com.example:ghost:1.0", "--no-central", "--json", "--repo"])
        .arg(server.url_str("/repo"))
        .assert()
        .code(2);

    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "error");
    assert!(payload["message"]
        .as_str()
        .expect("message")
        .contains("com.example:ghost:1.0"));
}

#[test]
fn path_prints_release_urls_without_network() {
    let assert = cargo_bin_cmd!("zap")
        .args(["path", "com.example:lib:1.0", "--offline", "--json"])
        .assert()
        .success();

    let payload = parse_json(&assert);
    assert_eq!(
        payload["details"]["artifact"],
        "https://repo1.maven.org/maven2/com/example/lib/1.0/lib-1.0.jar"
    );
    assert_eq!(
        payload["details"]["checksum"],
        "https://repo1.maven.org/maven2/com/example/lib/1.0/lib-1.0.jar.sha1"
    );
}

#[test]
fn path_negotiates_snapshot_versions() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/repo/com/example/lib/2.0-SNAPSHOT/maven-metadata.xml",
        ))
        .respond_with(status_code(200).body(
            r"<metadata><versioning>
                <snapshot><timestamp>20240301.120000</timestamp><buildNumber>4</buildNumber></snapshot>
                <snapshotVersions>
                  <snapshotVersion><extension>jar</extension><value>2.0-20240301.120000-4</value></snapshotVersion>
                  <snapshotVersion><extension>pom</extension><value>2.0-20240301.120000-4</value></snapshotVersion>
                </snapshotVersions>
              </versioning></metadata>",
        )),
    );

    let assert = cargo_bin_cmd!("zap")
        .args(["path", "com.example:lib:2.0-SNAPSHOT", "--json", "--repo"])
        .arg(server.url_str("/repo"))
        .assert()
        .success();

    let payload = parse_json(&assert);
    let artifact = payload["details"]["artifact"].as_str().expect("artifact");
    assert!(artifact.ends_with("/repo/com/example/lib/2.0-SNAPSHOT/lib-2.0-20240301.120000-4.jar"));
    assert_eq!(payload["details"]["checksum"], format!("{artifact}.sha1"));
}
