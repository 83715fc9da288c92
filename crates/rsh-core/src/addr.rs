//! Responder address helpers

use std::net::Ipv6Addr;

use rsh_protocol::DEFAULT_PORT;

/// Append the default port to a host that does not carry one.
///
/// `host` → `host:7107`, `host:22` is kept, a bare IPv6 literal is
/// bracketed first (`::1` → `[::1]:7107`).
pub fn with_default_port(target: &str) -> String {
    if target.parse::<Ipv6Addr>().is_ok() {
        return format!("[{}]:{}", target, DEFAULT_PORT);
    }

    let has_port = match target.rsplit_once(':') {
        Some((host, port)) => {
            (!host.contains(':') || host.ends_with(']')) && !port.is_empty()
        }
        None => false,
    };

    if has_port {
        target.to_string()
    } else {
        format!("{}:{}", target.trim_end_matches(':'), DEFAULT_PORT)
    }
}
