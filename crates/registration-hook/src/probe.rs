//! Translation of workload probes into registry checks.

use crate::service::{CheckDescriptor, CheckKind};
use crate::workload::{Probe, ProbeHandler};

/// Scheme used for every HTTP check; the registry's check executor cannot
/// run TLS checks.
const CHECK_SCHEME: &str = "http";

/// Converts a probe into a check against `host`.
///
/// Returns `None` when the probe has no HTTP or TCP handler, which simply
/// means the record is registered without a check.
pub fn to_check(probe: &Probe, host: &str) -> Option<CheckDescriptor> {
    let (kind, address) = match probe.handler.as_ref()? {
        ProbeHandler::HttpGet { path, port, .. } => (
            CheckKind::HttpGet,
            format!("{CHECK_SCHEME}://{}{}", join_host_port(host, *port), normalize_path(path)),
        ),
        ProbeHandler::TcpSocket { port } => (CheckKind::Tcp, join_host_port(host, *port)),
    };

    Some(CheckDescriptor {
        kind,
        address,
        interval: probe.period,
        timeout: probe.timeout,
    })
}

/// `host:port`, bracketing IPv6 literals.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
