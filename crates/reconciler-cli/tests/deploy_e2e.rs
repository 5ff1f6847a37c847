use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use assert_cmd::Command;
use tiny_http::{Response, Server};

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

fn write_project(root: &Path, base_url: &str) {
    write_file(
        &root.join("manifest.yaml"),
        &format!(
            r#"
manifest_version: "1.0"
projects:
  - name: demo
    path: projects/demo
    type: simple
environment_groups:
  - name: default
    environments:
      - name: prod
        url:
          type: value
          value: "{base_url}"
        auth:
          token:
            type: value
            value: test-token
"#
        ),
    );

    write_file(
        &root.join("projects/demo/configs.yaml"),
        r#"
configs:
  - id: dash-1
    type: api
    api: dashboard-v2
    template: dash.json
    parameters:
      name:
        type: literal
        value: my-dashboard
"#,
    );

    write_file(
        &root.join("projects/demo/templates/dash.json"),
        r#"{"dashboardMetadata":{"name":"{{.name}}"}}"#,
    );
}

/// A single-use stub of the classic config API: an empty list response
/// followed by a created response for the POST, mirroring the teacher's
/// `tiny_http`-backed e2e harness.
fn spawn_classic_stub() -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("bind stub server");
    let addr = server.server_addr().to_string();
    let requests_seen = Arc::new(AtomicUsize::new(0));

    let handle = thread::spawn(move || {
        for request in server.incoming_requests().take(2) {
            let seen = requests_seen.fetch_add(1, Ordering::SeqCst);
            let response = if seen == 0 {
                Response::from_string(r#"{"dashboards":[]}"#)
                    .with_header("Content-Type: application/json".parse::<tiny_http::Header>().unwrap())
            } else {
                Response::from_string(r#"{"id":"dash-generated-id"}"#)
                    .with_status_code(201)
                    .with_header("Content-Type: application/json".parse::<tiny_http::Header>().unwrap())
            };
            let _ = request.respond(response);
        }
    });

    (format!("http://{addr}"), handle)
}

#[test]
fn deploy_creates_a_new_classic_dashboard() {
    let (base_url, server) = spawn_classic_stub();
    let td = tempfile::tempdir().expect("tempdir");
    write_project(td.path(), &base_url);

    let report_path = td.path().join("report.jsonl");

    let mut cmd = Command::cargo_bin("reconciler").expect("binary");
    cmd.current_dir(td.path())
        .args(["deploy", "--manifest", "."])
        .args(["--report", report_path.to_str().unwrap()])
        .assert()
        .success();

    let report = fs::read_to_string(&report_path).expect("report written");
    assert!(report.contains("\"configId\":\"dash-1\""));
    assert!(report.contains("\"state\":\"SUCCESS\""));

    server.join().expect("stub server thread");
}

#[test]
fn deploy_fails_loudly_on_missing_manifest() {
    let td = tempfile::tempdir().expect("tempdir");

    Command::cargo_bin("reconciler")
        .expect("binary")
        .current_dir(td.path())
        .args(["deploy", "--manifest", "."])
        .assert()
        .failure();
}
