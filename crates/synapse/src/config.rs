// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// A2A wrapper for interactive CLI coding agents.
#[derive(Debug, Parser)]
#[command(name = "synapse", version, about)]
pub struct Config {
    /// Agent profile name (claude, gemini, codex, opencode, copilot,
    /// dummy) or path to a profile YAML file.
    #[arg(long, env = "SYNAPSE_PROFILE", default_value = "claude")]
    pub profile: String,

    /// HTTP port; allocated from the profile's band when omitted.
    #[arg(long, env = "SYNAPSE_PORT")]
    pub port: Option<u16>,

    /// Host address to bind to.
    #[arg(long, env = "SYNAPSE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Human-readable agent name.
    #[arg(long, env = "SYNAPSE_AGENT_NAME")]
    pub name: Option<String>,

    /// Role description injected with the identity instruction.
    #[arg(long, env = "SYNAPSE_AGENT_ROLE")]
    pub role: Option<String>,

    /// Named skill set mentioned in the identity instruction.
    #[arg(long, env = "SYNAPSE_SKILL_SET")]
    pub skill_set: Option<String>,

    /// Resolved initial instruction text. Supports `{{agent_id}}`,
    /// `{{agent_name}}`, `{{agent_role}}`, and `{{port}}` placeholders.
    #[arg(long, env = "SYNAPSE_INSTRUCTION")]
    pub instruction: Option<String>,

    /// File containing the initial instruction (overrides --instruction).
    #[arg(long, env = "SYNAPSE_INSTRUCTION_FILE")]
    pub instruction_file: Option<PathBuf>,

    /// Don't inject the identity instruction on first READY.
    #[arg(
        long,
        env = "SYNAPSE_SKIP_INITIAL_INSTRUCTIONS",
        default_value = "false",
        action = clap::ArgAction::Set
    )]
    pub skip_initial_instructions: bool,

    /// Terminal columns for the child PTY.
    #[arg(long, env = "SYNAPSE_COLS", default_value = "200")]
    pub cols: u16,

    /// Terminal rows for the child PTY.
    #[arg(long, env = "SYNAPSE_ROWS", default_value = "50")]
    pub rows: u16,

    /// Attach the controlling terminal (type directly into the child).
    #[arg(long)]
    pub interactive: bool,

    /// Record completed tasks in the history database.
    #[arg(
        long,
        env = "SYNAPSE_HISTORY_ENABLED",
        default_value = "false",
        action = clap::ArgAction::Set
    )]
    pub history_enabled: bool,

    /// Enable the shared task board.
    #[arg(
        long,
        env = "SYNAPSE_TASK_BOARD_ENABLED",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub task_board_enabled: bool,

    /// Task board database path.
    #[arg(long, env = "SYNAPSE_TASK_BOARD_DB_PATH")]
    pub task_board_db: Option<PathBuf>,

    /// SSL certificate file; with --ssl-key, the TCP listener serves TLS.
    #[arg(long, env = "SYNAPSE_SSL_CERT")]
    pub ssl_cert: Option<PathBuf>,

    /// SSL private key file.
    #[arg(long, env = "SYNAPSE_SSL_KEY")]
    pub ssl_key: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "SYNAPSE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SYNAPSE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Extra arguments for the child CLI (after --).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub tool_args: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ssl_cert.is_some() != self.ssl_key.is_some() {
            anyhow::bail!("--ssl-cert and --ssl-key must be provided together");
        }
        if let (Some(cert), Some(key)) = (&self.ssl_cert, &self.ssl_key) {
            if !cert.is_file() {
                anyhow::bail!("SSL certificate not found: {}", cert.display());
            }
            if !key.is_file() {
                anyhow::bail!("SSL key not found: {}", key.display());
            }
        }
        if self.cols == 0 || self.rows == 0 {
            anyhow::bail!("terminal size must be non-zero");
        }
        Ok(())
    }

    /// Extra child argv from `SYNAPSE_TOOL_ARGS` (NUL-separated) plus the
    /// trailing CLI args.
    pub fn resolved_tool_args(&self) -> Vec<String> {
        let mut args: Vec<String> = std::env::var("SYNAPSE_TOOL_ARGS")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v.split('\0').map(str::to_owned).collect())
            .unwrap_or_default();
        args.extend(self.tool_args.iter().cloned());
        args
    }

    /// The resolved instruction text, if any.
    pub fn resolved_instruction(&self) -> anyhow::Result<Option<String>> {
        if let Some(ref path) = self.instruction_file {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
            return Ok(Some(text));
        }
        Ok(self.instruction.clone())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
