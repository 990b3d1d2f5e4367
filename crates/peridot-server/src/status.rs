//! The four built-in status commands, handled inline by the Router and
//! never queued.
//!
//! Method line `status`, with the specific check named by a `Status`
//! header. The `is_slave`/`handling_commands` shapes deliberately mimic an
//! HTTP response line so an external TCP health-checker (an HAProxy-style
//! liveness probe) can treat them as one without speaking the rest of the
//! protocol.

use peridot_types::ReplicaRole;
use peridot_wire::{Request, Response};

use crate::plugin::PluginRegistry;

/// True if `request` is one of the inline status commands.
pub fn is_status_command(request: &Request) -> bool {
    request.command_name().eq_ignore_ascii_case("status")
}

/// Dispatches a status command to its specific check.
pub fn handle(
    request: &Request,
    role: ReplicaRole,
    our_version: &str,
    leader_version: &str,
    plugins: &PluginRegistry,
) -> Response {
    match request.headers.get("Status").unwrap_or("") {
        s if s.eq_ignore_ascii_case("is_slave") => is_slave(role),
        s if s.eq_ignore_ascii_case("handling_commands") => {
            handling_commands(role, our_version, leader_version)
        }
        s if s.eq_ignore_ascii_case("ping") => Response::new("200 OK"),
        s if s.eq_ignore_ascii_case("status") => {
            status(role, our_version, plugins)
        }
        other => Response::new(format!("404 Unrecognized status command {other:?}")),
    }
}

fn is_slave(role: ReplicaRole) -> Response {
    if role == ReplicaRole::Slaving {
        Response::new("HTTP/1.1 200 Slaving")
    } else {
        Response::new(format!("HTTP/1.1 500 Not slaving. State={}", role.name()))
    }
}

fn handling_commands(role: ReplicaRole, our_version: &str, leader_version: &str) -> Response {
    if role == ReplicaRole::Slaving && our_version == leader_version {
        Response::new("HTTP/1.1 200 Slaving")
    } else if role != ReplicaRole::Slaving {
        Response::new(format!("HTTP/1.1 500 Not slaving. State={}", role.name()))
    } else {
        Response::new(format!(
            "HTTP/1.1 500 Version mismatch. Ours={our_version} Leader={leader_version}"
        ))
    }
}

fn status(role: ReplicaRole, our_version: &str, plugins: &PluginRegistry) -> Response {
    let body = serde_json::json!({
        "isMaster": (role == ReplicaRole::Mastering).to_string(),
        "state": role.name(),
        "version": our_version,
        "plugins": plugins.status_json(),
    });
    Response::new("200 OK").with_body(serde_json::to_vec(&body).expect("status body always serializes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_request(subtype: &str) -> Request {
        let mut req = Request::new("status r_1_r");
        req.headers.push("Status", subtype);
        req
    }

    #[test]
    fn recognizes_status_command_by_name() {
        assert!(is_status_command(&status_request("ping")));
        assert!(!is_status_command(&Request::new("write r_1_r")));
    }

    #[test]
    fn is_slave_reports_200_only_when_slaving() {
        let plugins = PluginRegistry::new();
        let resp = handle(&status_request("is_slave"), ReplicaRole::Slaving, "1", "1", &plugins);
        assert_eq!(resp.method_line, "HTTP/1.1 200 Slaving");

        let resp = handle(&status_request("is_slave"), ReplicaRole::Mastering, "1", "1", &plugins);
        assert!(resp.method_line.starts_with("HTTP/1.1 500"));
    }

    #[test]
    fn handling_commands_checks_version_match() {
        let plugins = PluginRegistry::new();
        let resp = handle(
            &status_request("handling_commands"),
            ReplicaRole::Slaving,
            "A",
            "A",
            &plugins,
        );
        assert_eq!(resp.method_line, "HTTP/1.1 200 Slaving");

        let resp = handle(
            &status_request("handling_commands"),
            ReplicaRole::Slaving,
            "A",
            "B",
            &plugins,
        );
        assert!(resp.method_line.starts_with("HTTP/1.1 500"));
    }

    #[test]
    fn ping_is_always_200() {
        let plugins = PluginRegistry::new();
        let resp = handle(&status_request("ping"), ReplicaRole::Searching, "A", "B", &plugins);
        assert_eq!(resp.method_line, "200 OK");
    }

    #[test]
    fn status_body_is_well_formed_json() {
        let plugins = PluginRegistry::new();
        let resp = handle(&status_request("status"), ReplicaRole::Mastering, "A", "A", &plugins);
        let parsed: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(parsed["isMaster"], "true");
        assert_eq!(parsed["state"], "MASTERING");
        assert_eq!(parsed["version"], "A");
    }
}
