// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port allocation for multi-instance support.
//!
//! Each known agent type owns a fixed band of ten ports; unknown types
//! draw from the shared range above 8200, lowest free port first.

use std::net::TcpListener;

use crate::registry::{self, pid_alive, AgentRegistry};

/// Known agent-type bands, inclusive.
const PORT_RANGES: &[(&str, u16, u16)] = &[
    ("claude", 8100, 8109),
    ("gemini", 8110, 8119),
    ("codex", 8120, 8129),
    ("opencode", 8130, 8139),
    ("copilot", 8140, 8149),
    ("dummy", 8190, 8199),
];

const UNKNOWN_BASE: u16 = 8200;
/// Unknown types share the bands above the known set; ten bands of ten.
const UNKNOWN_END: u16 = 8299;

/// The inclusive port range for an agent type.
pub fn port_range(agent_type: &str) -> (u16, u16) {
    if let Some((_, start, end)) = PORT_RANGES.iter().find(|(t, _, _)| *t == agent_type) {
        return (*start, *end);
    }
    (UNKNOWN_BASE, UNKNOWN_END)
}

/// Whether a port can be bound locally right now.
pub fn port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Finds free ports within an agent type's band, cleaning up dead records.
pub struct PortManager<'a> {
    registry: &'a AgentRegistry,
}

impl<'a> PortManager<'a> {
    pub fn new(registry: &'a AgentRegistry) -> Self {
        Self { registry }
    }

    /// Lowest available port in the band for `agent_type`.
    ///
    /// Registry entries held by dead PIDs are unlinked along the way.
    pub fn available_port(&self, agent_type: &str) -> Option<u16> {
        let (start, end) = port_range(agent_type);
        for port in start..=end {
            let agent_id = registry::agent_id(agent_type, port);
            if let Some(record) = self.registry.get(&agent_id) {
                if pid_alive(record.pid) {
                    continue;
                }
                self.registry.unregister(&agent_id);
            }
            if port_available(port) {
                return Some(port);
            }
        }
        None
    }

    /// Live instances of an agent type, for the exhaustion report.
    pub fn running_instances(&self, agent_type: &str) -> Vec<crate::registry::AgentRecord> {
        let (start, end) = port_range(agent_type);
        (start..=end)
            .filter_map(|port| self.registry.get(&registry::agent_id(agent_type, port)))
            .filter(|record| pid_alive(record.pid))
            .collect()
    }

    /// Human-readable report when every port in the band is taken.
    pub fn exhaustion_report(&self, agent_type: &str) -> String {
        let (start, end) = port_range(agent_type);
        let mut lines = vec![
            format!("All ports in range {start}-{end} are in use for '{agent_type}'."),
            String::new(),
            "Running instances:".to_owned(),
        ];
        for record in self.running_instances(agent_type) {
            lines.push(format!("  {} (PID: {})", record.agent_id, record.pid));
        }
        lines.push(String::new());
        lines.push(format!(
            "Stop an instance of '{agent_type}' or pass --port to pick one manually."
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
