//! End-to-end runs of the node against a fake coordinator.

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::net::TcpListener;
use std::process::ExitCode;

use anyhow::{Context, Result};
use multinode_client::test_support::FakeCoordinator;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use super::run;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("create temp dir")?,
        })
    }

    fn write(&self, name: &str, body: &str) -> Result<OsString> {
        let path = self.dir.path().join(name);
        fs::write(&path, body).with_context(|| format!("write {name}"))?;
        Ok(path.into_os_string())
    }

    /// Settings pointing at `port` on loopback with fast polling.
    fn settings(&self, port: u16) -> Result<OsString> {
        let body = json!({
            "coordinator_hostname": "127.0.0.1",
            "port": port,
            "poll_delay": 0.01,
        });
        self.write("lava-coordinator.conf", &body.to_string())
    }

    fn job(&self) -> Result<OsString> {
        let body = json!({
            "job_name": "multinode smoke",
            "target": "node-a",
            "protocols": {
                "lava-multinode": {"target_group": "g1", "group_size": 2, "role": "server"}
            }
        });
        self.write("job.json", &body.to_string())
    }
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

impl Outcome {
    fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

fn invoke(args: Vec<OsString>, stdin: &str) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut argv = vec![OsString::from("lava-node")];
    argv.extend(args);
    let exit = run(argv, Cursor::new(stdin.to_owned()), &mut stdout, &mut stderr);
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

fn group_data() -> String {
    json!({"response": "group_data", "roles": {"node-a": "server", "node-b": "client"}})
        .to_string()
}

fn ack() -> String {
    json!({"response": "ack"}).to_string()
}

#[fixture]
fn workspace() -> Workspace {
    Workspace::new().expect("workspace")
}

fn node_args(workspace: &Workspace, port: u16, extra: &[&str]) -> Vec<OsString> {
    let mut args = vec![
        OsString::from("--coordinator-config"),
        workspace.settings(port).expect("settings"),
    ];
    args.extend(extra.iter().map(OsString::from));
    args.push(workspace.job().expect("job"));
    args
}

#[rstest]
fn registers_and_relays_signals(workspace: Workspace) {
    let mut coordinator = FakeCoordinator::spawn([
        group_data(),
        ack(),
        json!({"response": "ack", "message": {"node-b": {"ip": "10.0.0.2"}}}).to_string(),
    ])
    .expect("spawn coordinator");

    let outcome = invoke(
        node_args(&workspace, coordinator.port(), &[]),
        concat!(
            r#"{"request": "lava_sync", "messageID": "ready"}"#,
            "\n",
            "not a signal\n",
            r#"{"request": "lava-wait", "messageID": "addr"}"#,
            "\n",
        ),
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    let lines = outcome.stdout_lines();
    assert_eq!(lines.len(), 3, "stdout: {}", outcome.stdout);
    let first: Value = serde_json::from_str(lines.first().expect("group line")).expect("json");
    assert_eq!(first["roles"]["node-b"], "client");
    let second: Value = serde_json::from_str(lines.get(1).expect("sync line")).expect("json");
    assert_eq!(
        second,
        json!({"request": "lava_sync", "messageID": "ready", "reply": "ack"})
    );
    let third: Value = serde_json::from_str(lines.get(2).expect("wait line")).expect("json");
    assert_eq!(third["reply"], json!({"node-b": {"ip": "10.0.0.2"}}));

    let requests = coordinator.take_requests().expect("requests");
    let names: Vec<&str> = requests
        .iter()
        .filter_map(|request| request["request"].as_str())
        .collect();
    assert_eq!(names, vec!["group_data", "lava_sync", "lava_wait"]);
    let registration = requests.first().expect("registration");
    assert_eq!(registration["client_name"], "node-a");
    assert_eq!(registration["role"], "server");
    assert_eq!(registration["host"], "127.0.0.1");
}

#[rstest]
fn completion_lines_replace_json_output(workspace: Workspace) {
    let coordinator =
        FakeCoordinator::spawn([group_data(), ack()]).expect("spawn coordinator");

    let outcome = invoke(
        node_args(&workspace, coordinator.port(), &["--completion-lines"]),
        concat!(r#"{"request": "lava_sync", "messageID": "ready"}"#, "\n"),
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout_lines().get(1), Some(&"<LAVA_SYNC_COMPLETE>"));
}

#[rstest]
fn clear_group_is_sent_on_end_of_input(workspace: Workspace) {
    let mut coordinator =
        FakeCoordinator::spawn([group_data(), ack()]).expect("spawn coordinator");

    let outcome = invoke(
        node_args(&workspace, coordinator.port(), &["--clear-group"]),
        "",
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    let requests = coordinator.take_requests().expect("requests");
    let last = requests.last().expect("clear request");
    assert_eq!(last["request"], "clear_group");
    assert_eq!(last["group_size"], 2);
}

#[rstest]
fn refused_send_keeps_the_node_running(workspace: Workspace) {
    let mut coordinator = FakeCoordinator::spawn([
        group_data(),
        json!({"response": "nack"}).to_string(),
        ack(),
    ])
    .expect("spawn coordinator");

    let outcome = invoke(
        node_args(&workspace, coordinator.port(), &[]),
        concat!(
            r#"{"request": "lava_send", "messageID": "addr", "message": {"ip": "10.0.0.1"}}"#,
            "\n",
            r#"{"request": "lava_sync", "messageID": "ready"}"#,
            "\n",
        ),
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    let lines = outcome.stdout_lines();
    assert_eq!(lines.len(), 3, "stdout: {}", outcome.stdout);
    let refused: Value = serde_json::from_str(lines.get(1).expect("send line")).expect("json");
    assert_eq!(refused["reply"], "nack");
    let requests = coordinator.take_requests().expect("requests");
    let names: Vec<&str> = requests
        .iter()
        .filter_map(|request| request["request"].as_str())
        .collect();
    assert_eq!(names, vec!["group_data", "lava_send", "lava_sync"]);
}

#[rstest]
fn refused_registration_fails(workspace: Workspace) {
    let coordinator = FakeCoordinator::spawn([json!({"response": "nack"}).to_string()])
        .expect("spawn coordinator");

    let outcome = invoke(node_args(&workspace, coordinator.port(), &[]), "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("rejected 'group_data'"),
        "stderr: {}",
        outcome.stderr
    );
}

#[rstest]
fn unreachable_coordinator_exhausts_attempts(workspace: Workspace) {
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let outcome = invoke(node_args(&workspace, port, &["--max-attempts", "2"]), "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("after 2 connection attempts"),
        "stderr: {}",
        outcome.stderr
    );
}

#[rstest]
fn descriptor_without_group_is_fatal(workspace: Workspace) {
    let job = workspace
        .write("job.json", r#"{"target": "node-a", "group_size": 2}"#)
        .expect("job");

    let outcome = invoke(vec![job], "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("missing 'target_group'"),
        "stderr: {}",
        outcome.stderr
    );
}

#[rstest]
fn invalid_settings_file_is_fatal(workspace: Workspace) {
    let settings = workspace
        .write("lava-coordinator.conf", "port = 3079")
        .expect("settings");
    let job = workspace.job().expect("job");

    let outcome = invoke(
        vec![OsString::from("--coordinator-config"), settings, job],
        "",
    );

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("invalid coordinator settings"),
        "stderr: {}",
        outcome.stderr
    );
}

#[test]
fn help_exits_successfully() {
    let outcome = invoke(vec![OsString::from("--help")], "");
    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("Usage"));
    assert!(outcome.stderr.is_empty());
}
