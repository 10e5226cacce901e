//! CLI Integration Tests
//!
//! Runs the `rvmaster` binary against a stand-in master on a loopback port.
//!
//! Test Scenarios:
//! 1. Listings printed to stdout
//! 2. Master resolved from `--master` or `REAL_MASTER_URI`
//! 3. Non-zero exit for a missing or unreachable master
//! 4. `--timeout` bounding the wait

use rvmaster_common::protocol::{Envelope, Request, Response};
use rvmaster_common::transport::TcpServer;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Command, Output};

// ============================================================================
// Test Helpers
// ============================================================================

/// Starts a master that answers the three query methods plus `echo`.
fn start_master() -> String {
    let server = TcpServer::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();

    server.spawn(|request: Request| {
        let envelope = match request.method.as_str() {
            "getPid" => Envelope::success("", json!(4242)),
            "getPublishedTopics" => Envelope::success(
                "current topics",
                json!([["/chatter", "std_msgs/String"], ["/rosout", "rosgraph_msgs/Log"]]),
            ),
            "getSystemState" => Envelope::success(
                "current system state",
                json!([[["/chatter", ["/talker"]]], [["/chatter", ["/listener"]]], []]),
            ),
            "echo" => Envelope::success("", Value::Array(request.params.clone())),
            other => Envelope::error(format!("unknown method {}", other)),
        };
        Ok(Response::from_envelope(request.id, envelope))
    });

    format!("http://{}", addr)
}

fn dead_master() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn rvmaster(master_env: Option<&str>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rvmaster"));
    command.args(args).env("RUST_LOG", "error");
    match master_env {
        Some(uri) => command.env("REAL_MASTER_URI", uri),
        None => command.env_remove("REAL_MASTER_URI"),
    };
    command.output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ============================================================================
// Listings
// ============================================================================

#[test]
fn test_topics_from_env() {
    let master = start_master();
    let output = rvmaster(Some(&master), &["topics"]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "/chatter  std_msgs/String\n/rosout   rosgraph_msgs/Log\n"
    );
}

#[test]
fn test_nodes_from_flag() {
    let master = start_master();
    let output = rvmaster(None, &["--master", &master, "nodes"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "/listener\n/talker\n");
}

#[test]
fn test_flag_overrides_env() {
    let master = start_master();
    let output = rvmaster(Some(&dead_master()), &["--master", &master, "check"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("is up"));
}

#[test]
fn test_call_prints_payload_json() {
    let master = start_master();
    let output = rvmaster(
        Some(&master),
        &["--name", "/cli_test", "call", "echo", "-a", "/chatter", "-a", "{\"k\":1}"],
    );

    assert!(output.status.success());
    let payload: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(payload, json!(["/cli_test", "/chatter", {"k": 1}]));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_master_uri_fails() {
    let output = rvmaster(None, &["check"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("REAL_MASTER_URI"));
}

#[test]
fn test_check_unreachable_master_fails() {
    let output = rvmaster(Some(&dead_master()), &["check"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not reachable"));
}

#[test]
fn test_timeout_bounds_wait() {
    let output = rvmaster(Some(&dead_master()), &["--timeout", "0.3", "nodes"]);

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_call_error_status_fails() {
    let master = start_master();
    let output = rvmaster(Some(&master), &["call", "deleteEverything"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown method"));
}
