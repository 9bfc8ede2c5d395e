// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent profile files.
//!
//! A profile is a YAML document describing how to launch and observe one
//! kind of CLI agent: the command and arguments, the byte sequence that
//! commits typed input, environment overrides, and the idle-detection
//! policy. Built-in profiles ship next to the binary; `--profile` also
//! accepts a path to a custom YAML file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Pattern literal selecting the raw-stream bracketed-paste scan instead
/// of a regex (`ESC [ ? 2004 h`).
pub const BRACKETED_PASTE_MODE: &str = "BRACKETED_PASTE_MODE";

/// When a hybrid profile applies its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternUse {
    /// Pattern is consulted on every check.
    #[default]
    Always,
    /// Pattern only gates the first READY; timeout takes over afterwards.
    StartupOnly,
}

/// Idle-detection strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleStrategy {
    Pattern,
    Timeout,
    Hybrid,
}

/// Idle-detection section of a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct IdleDetectionSpec {
    pub strategy: IdleStrategy,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub pattern_use: PatternUse,
    /// Seconds of output silence before READY (timeout/hybrid strategies).
    #[serde(default = "default_idle_timeout")]
    pub timeout: f64,
}

fn default_idle_timeout() -> f64 {
    1.5
}

impl IdleDetectionSpec {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0))
    }
}

/// Waiting-detection section (optional).
#[derive(Debug, Clone, Deserialize)]
pub struct WaitingDetectionSpec {
    pub regex: String,
}

/// Raw YAML document shape.
#[derive(Debug, Clone, Deserialize)]
struct ProfileDoc {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    submit_sequence: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    idle_detection: Option<IdleDetectionSpec>,
    /// Legacy single-pattern form, superseded by `idle_detection`.
    #[serde(default)]
    idle_regex: Option<String>,
    #[serde(default)]
    waiting_detection: Option<WaitingDetectionSpec>,
}

/// A resolved agent profile.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Escape-decoded bytes that commit typed input (`\n`, `\r`, ...).
    pub submit_sequence: Vec<u8>,
    pub env: HashMap<String, String>,
    pub idle_detection: IdleDetectionSpec,
    pub waiting_regex: Option<String>,
}

impl Profile {
    /// Load a profile by name (searching the built-in directory) or from
    /// an explicit `.yaml` path.
    pub fn load(name_or_path: &str) -> anyhow::Result<Self> {
        let path = resolve_profile_path(name_or_path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name_or_path)
            .to_owned();
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read profile {}", path.display()))?;
        Self::parse(&name, &raw)
    }

    /// Parse a profile document.
    pub fn parse(name: &str, yaml: &str) -> anyhow::Result<Self> {
        let doc: ProfileDoc =
            serde_yaml::from_str(yaml).with_context(|| format!("parse profile {name}"))?;

        // Legacy fallback: a bare `idle_regex` becomes a pattern strategy.
        let idle_detection = match (doc.idle_detection, doc.idle_regex) {
            (Some(spec), _) => spec,
            (None, Some(pattern)) => IdleDetectionSpec {
                strategy: IdleStrategy::Pattern,
                pattern: Some(pattern),
                pattern_use: PatternUse::default(),
                timeout: default_idle_timeout(),
            },
            (None, None) => IdleDetectionSpec {
                strategy: IdleStrategy::Timeout,
                pattern: None,
                pattern_use: PatternUse::default(),
                timeout: default_idle_timeout(),
            },
        };

        Ok(Self {
            name: name.to_owned(),
            command: doc.command,
            args: doc.args,
            submit_sequence: decode_escapes(doc.submit_sequence.as_deref().unwrap_or("\\n")),
            env: doc.env,
            idle_detection,
            waiting_regex: doc.waiting_detection.map(|w| w.regex),
        })
    }
}

/// Resolve `--profile` to a YAML path: explicit path wins, then the
/// `SYNAPSE_PROFILE_DIR` override, then the profiles directory beside the
/// binary, then the compile-time source tree (dev runs).
fn resolve_profile_path(name_or_path: &str) -> anyhow::Result<PathBuf> {
    let direct = Path::new(name_or_path);
    if direct.extension().is_some() && direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = std::env::var_os("SYNAPSE_PROFILE_DIR") {
        candidates.push(PathBuf::from(dir));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("profiles"));
        }
    }
    candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("profiles"));

    for dir in candidates {
        let path = dir.join(format!("{name_or_path}.yaml"));
        if path.is_file() {
            return Ok(path);
        }
    }
    anyhow::bail!("profile not found: {name_or_path}")
}

/// Decode the `\n`, `\r`, `\t`, `\xNN`, and `\\` escapes a profile may use
/// in `submit_sequence`.
pub fn decode_escapes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('e') => out.push(0x1b),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let (Some(h), Some(l)) = (hi.to_digit(16), lo.to_digit(16)) {
                        out.push((h * 16 + l) as u8);
                    }
                }
            }
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
