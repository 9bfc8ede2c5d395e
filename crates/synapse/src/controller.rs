// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal controller: owns the PTY and the child CLI.
//!
//! A dedicated reader task drains the master fd with a bounded poll,
//! feeding the render buffer and the idle state machine. Writes are
//! serialized so the `(payload, submit sequence)` pair is never interleaved
//! with another writer. The one-shot identity injection fires on the first
//! transition to READY and opens the readiness gate for write-bearing
//! endpoints.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::libc;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::outbuf::OutputTail;
use crate::profile::{IdleDetectionSpec, IdleStrategy, PatternUse, BRACKETED_PASTE_MODE};
use crate::pty::nbio::{read_chunk, write_all};
use crate::pty::spawn::NativePty;
use crate::pty::ExitStatus;
use crate::registry::AgentRegistry;
use crate::screen::Screen;
use crate::status::{AgentStatus, DONE_RELAX};

/// Reader poll interval; bounds how quickly `stop()` is observed.
const READ_POLL: Duration = Duration::from_millis(100);
/// Delay between writing a payload and its submit sequence.
const WRITE_SETTLE_DELAY: Duration = Duration::from_millis(150);
/// How long the identity worker waits for the PTY to be usable.
const IDENTITY_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Pause after the identity write so the child can redraw.
const POST_WRITE_IDLE_DELAY: Duration = Duration::from_millis(500);
/// Raw tail retained for debugging.
const RAW_TAIL_CAPACITY: usize = 64 * 1024;
/// Window of rendered text the idle/waiting patterns are matched against.
const PATTERN_WINDOW: usize = 1024;

/// Errors surfaced by controller operations.
#[derive(Debug)]
pub enum ControllerError {
    /// The PTY master is not open (not started, or already stopped).
    NotReady,
    Io(std::io::Error),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => f.write_str("terminal not ready"),
            Self::Io(e) => write!(f, "pty write failed: {e}"),
        }
    }
}

impl std::error::Error for ControllerError {}

/// Identity fields used for the initial-instruction injection and the
/// registry record.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub agent_id: String,
    pub agent_type: String,
    pub port: u16,
    pub name: Option<String>,
    pub role: Option<String>,
    /// Named skill set appended to the instruction as a short block.
    pub skill_set: Option<String>,
    /// Resolved instruction template; `{{agent_id}}`, `{{agent_name}}`,
    /// `{{agent_role}}` and `{{port}}` are substituted at injection time.
    pub instruction: Option<String>,
    pub skip_initial_instructions: bool,
}

/// Construction inputs for [`TerminalController`].
pub struct ControllerConfig {
    pub command: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub submit_sequence: Vec<u8>,
    pub idle: IdleDetectionSpec,
    pub waiting_regex: Option<String>,
    pub identity: IdentityConfig,
    pub cols: u16,
    pub rows: u16,
}

/// A status observation: monotonically increasing sequence plus status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub seq: u64,
    pub status: AgentStatus,
}

/// Compiled idle-detection rule.
enum IdlePattern {
    Regex(Regex),
    /// Ready while the child has bracketed paste enabled.
    BracketedPaste,
    None,
}

/// The idle state machine, evaluated on every reader wake.
struct IdleMonitor {
    strategy: IdleStrategy,
    pattern: IdlePattern,
    pattern_use: PatternUse,
    timeout: Duration,
    /// Set once the pattern has matched at least once (hybrid strategies).
    first_match_done: bool,
}

impl IdleMonitor {
    fn new(spec: &IdleDetectionSpec) -> Self {
        let mut strategy = spec.strategy;
        let pattern = match spec.pattern.as_deref() {
            Some(BRACKETED_PASTE_MODE) => IdlePattern::BracketedPaste,
            Some(raw) => match Regex::new(raw) {
                Ok(re) => IdlePattern::Regex(re),
                Err(e) => {
                    // A broken pattern must not take the wrapper down.
                    warn!("idle pattern failed to compile ({e}); falling back to timeout");
                    strategy = IdleStrategy::Timeout;
                    IdlePattern::None
                }
            },
            None => IdlePattern::None,
        };
        // Pattern strategies with no pattern degrade to timeout as well.
        if matches!(strategy, IdleStrategy::Pattern | IdleStrategy::Hybrid)
            && matches!(pattern, IdlePattern::None)
        {
            strategy = IdleStrategy::Timeout;
        }
        Self {
            strategy,
            pattern,
            pattern_use: spec.pattern_use,
            timeout: spec.timeout_duration(),
            first_match_done: false,
        }
    }

    fn pattern_matches(&self, screen: &Screen) -> bool {
        match &self.pattern {
            IdlePattern::Regex(re) => {
                let context = screen.rendered_context();
                let tail: String = {
                    let count = context.chars().count();
                    let skip = count.saturating_sub(PATTERN_WINDOW);
                    context.chars().skip(skip).collect()
                };
                re.is_match(&tail)
            }
            IdlePattern::BracketedPaste => screen.bracketed_paste(),
            IdlePattern::None => false,
        }
    }

    fn timeout_elapsed(&self, last_output: Option<Instant>) -> bool {
        // `last_output` stays None until the child's first byte, so a
        // slow-launching CLI is never declared ready before it speaks.
        match last_output {
            Some(at) => at.elapsed() >= self.timeout,
            None => false,
        }
    }

    /// Whether the child should be considered READY right now.
    fn is_ready(&mut self, screen: &Screen, last_output: Option<Instant>) -> bool {
        match self.strategy {
            IdleStrategy::Pattern => {
                let matched = self.pattern_matches(screen);
                if matched {
                    self.first_match_done = true;
                }
                matched
            }
            IdleStrategy::Timeout => self.timeout_elapsed(last_output),
            IdleStrategy::Hybrid => {
                if !self.first_match_done {
                    let matched = self.pattern_matches(screen);
                    if matched {
                        self.first_match_done = true;
                    }
                    return matched;
                }
                match self.pattern_use {
                    PatternUse::StartupOnly => self.timeout_elapsed(last_output),
                    PatternUse::Always => {
                        self.pattern_matches(screen) || self.timeout_elapsed(last_output)
                    }
                }
            }
        }
    }
}

struct StatusState {
    status: AgentStatus,
    /// When the status entered DONE; drives the auto-relax.
    done_at: Option<Instant>,
}

/// State shared between the controller handle, the reader task, and the
/// identity worker.
struct Shared {
    screen: Mutex<Screen>,
    raw: Mutex<OutputTail>,
    status: Mutex<StatusState>,
    last_output: Mutex<Option<Instant>>,
    running: AtomicBool,
    identity_sent: AtomicBool,
    identity_sending: AtomicBool,
    status_seq: AtomicU64,
    status_tx: watch::Sender<StatusEvent>,
    /// Flips true once the identity injection completed or was skipped.
    gate_tx: watch::Sender<bool>,
    pty: Mutex<Option<Arc<NativePty>>>,
    exit_status: Mutex<Option<ExitStatus>>,
}

/// Handle to one wrapped CLI. Cheap to clone.
#[derive(Clone)]
pub struct TerminalController {
    shared: Arc<Shared>,
    registry: Arc<AgentRegistry>,
    identity: Arc<IdentityConfig>,
    submit_sequence: Arc<Vec<u8>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    reader: Arc<Mutex<Option<JoinHandle<()>>>>,
    config: Arc<ControllerStartup>,
}

/// The subset of [`ControllerConfig`] needed after construction.
struct ControllerStartup {
    command: Vec<String>,
    envs: Vec<(String, String)>,
    idle: IdleDetectionSpec,
    waiting_regex: Option<Regex>,
    cols: u16,
    rows: u16,
}

impl TerminalController {
    pub fn new(config: ControllerConfig, registry: Arc<AgentRegistry>) -> Self {
        let waiting_regex = config.waiting_regex.as_deref().and_then(|raw| {
            Regex::new(raw)
                .map_err(|e| warn!("waiting pattern failed to compile ({e}); ignoring"))
                .ok()
        });
        let (status_tx, _) = watch::channel(StatusEvent { seq: 0, status: AgentStatus::Processing });
        let (gate_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                screen: Mutex::new(Screen::new(config.cols, config.rows)),
                raw: Mutex::new(OutputTail::new(RAW_TAIL_CAPACITY)),
                status: Mutex::new(StatusState {
                    status: AgentStatus::Processing,
                    done_at: None,
                }),
                last_output: Mutex::new(None),
                running: AtomicBool::new(false),
                identity_sent: AtomicBool::new(false),
                identity_sending: AtomicBool::new(false),
                status_seq: AtomicU64::new(0),
                status_tx,
                gate_tx,
                pty: Mutex::new(None),
                exit_status: Mutex::new(None),
            }),
            registry,
            identity: Arc::new(config.identity),
            submit_sequence: Arc::new(config.submit_sequence),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            reader: Arc::new(Mutex::new(None)),
            config: Arc::new(ControllerStartup {
                command: config.command,
                envs: config.envs,
                idle: config.idle,
                waiting_regex,
                cols: config.cols,
                rows: config.rows,
            }),
        }
    }

    /// Spawn the child and start the reader task (background mode).
    pub fn start(&self) -> anyhow::Result<()> {
        let pty = Arc::new(NativePty::spawn(
            &self.config.command,
            &self.config.envs,
            self.config.cols,
            self.config.rows,
        )?);
        info!(pid = pty.child_pid(), command = %self.config.command.join(" "), "child started");
        *self.shared.pty.lock() = Some(Arc::clone(&pty));
        self.shared.running.store(true, Ordering::Release);
        self.set_status(AgentStatus::Processing);

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.reader_loop(pty).await;
        });
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    /// Run attached to the caller's terminal: the reader loop still drives
    /// the state machine, while stdin is relayed raw to the child and
    /// output mirrored to stdout. Terminal modes are restored on exit.
    pub async fn run_interactive(&self) -> anyhow::Result<ExitStatus> {
        self.start()?;
        let pty = self.pty().ok_or_else(|| anyhow::anyhow!("pty not open"))?;

        let stdin = rustix::stdio::stdin();
        let saved = rustix::termios::tcgetattr(stdin).ok();
        if let Some(ref termios) = saved {
            let mut raw = termios.clone();
            raw.make_raw();
            let _ = rustix::termios::tcsetattr(stdin, rustix::termios::OptionalActions::Now, &raw);
        }

        // Relay stdin → master until the child exits.
        let relay_pty = Arc::clone(&pty);
        let relay_running = Arc::clone(&self.shared);
        let relay = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 1024];
            while relay_running.running.load(Ordering::Acquire) {
                match tokio::time::timeout(READ_POLL, stdin.read(&mut buf)).await {
                    Ok(Ok(0)) => break,
                    Ok(Ok(n)) => {
                        if write_all(relay_pty.master(), &buf[..n]).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(_)) => break,
                    Err(_) => continue,
                }
            }
        });

        let status = self.wait().await;
        relay.abort();

        if let Some(ref termios) = saved {
            let _ =
                rustix::termios::tcsetattr(stdin, rustix::termios::OptionalActions::Now, termios);
        }
        Ok(status.unwrap_or(ExitStatus { code: Some(1), signal: None }))
    }

    /// Wait for the child to exit.
    pub async fn wait(&self) -> Option<ExitStatus> {
        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.shared.exit_status.lock()
    }

    /// Write a message followed by the submit sequence, as if typed.
    ///
    /// Atomic per message; concurrent writers queue on the internal lock.
    pub async fn write(&self, text: &str) -> Result<(), ControllerError> {
        self.write_with_submit(text, true).await
    }

    /// Write raw text without the submit sequence.
    pub async fn write_raw(&self, text: &str) -> Result<(), ControllerError> {
        self.write_with_submit(text, false).await
    }

    async fn write_with_submit(&self, text: &str, submit: bool) -> Result<(), ControllerError> {
        let pty = self.pty().ok_or(ControllerError::NotReady)?;
        let _guard = self.write_lock.lock().await;
        self.set_status(AgentStatus::Processing);
        write_all(pty.master(), text.as_bytes()).await.map_err(ControllerError::Io)?;
        if submit {
            // Let the TUI ingest the payload before the commit keystroke.
            tokio::time::sleep(WRITE_SETTLE_DELAY).await;
            write_all(pty.master(), &self.submit_sequence).await.map_err(ControllerError::Io)?;
        }
        Ok(())
    }

    /// Send SIGINT to the child's process group.
    pub fn interrupt(&self) -> Result<(), ControllerError> {
        let pty = self.pty().ok_or(ControllerError::NotReady)?;
        pty.interrupt().map_err(|e| {
            ControllerError::Io(std::io::Error::other(e.to_string()))
        })?;
        // Output usually follows an interrupt.
        self.set_status(AgentStatus::Processing);
        Ok(())
    }

    /// Stop the child and the reader. Safe to call twice.
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        let pty = self.shared.pty.lock().take();
        if let Some(pty) = pty {
            pty.terminate();
            let waiter = Arc::clone(&pty);
            let _ = tokio::time::timeout(
                Duration::from_secs(5),
                tokio::task::spawn_blocking(move || waiter.wait_blocking()),
            )
            .await;
        }
        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
        self.registry.unregister(&self.identity.agent_id);
    }

    pub fn status(&self) -> AgentStatus {
        self.shared.status.lock().status
    }

    /// Subscribe to status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusEvent> {
        self.shared.status_tx.subscribe()
    }

    /// Subscribe to the readiness gate (true once identity is in).
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.shared.gate_tx.subscribe()
    }

    pub fn identity_sent(&self) -> bool {
        self.shared.identity_sent.load(Ordering::Acquire)
    }

    pub fn running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.shared.pty.lock().as_ref().map(|p| p.child_pid())
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.shared.exit_status.lock()
    }

    /// The rendered tail of the child's screen (≤ 2,000 chars).
    pub fn rendered_context(&self) -> String {
        self.shared.screen.lock().rendered_context()
    }

    /// Mark a task completion; DONE relaxes back to READY after a bit.
    pub fn mark_done(&self) {
        let changed = {
            let mut state = self.shared.status.lock();
            state.done_at = Some(Instant::now());
            if state.status != AgentStatus::Done {
                state.status = AgentStatus::Done;
                true
            } else {
                false
            }
        };
        if changed {
            self.publish_status(AgentStatus::Done);
        }
    }

    fn pty(&self) -> Option<Arc<NativePty>> {
        self.shared.pty.lock().clone()
    }

    /// The reader task: drain the master, feed buffers, run idle checks.
    async fn reader_loop(self, pty: Arc<NativePty>) {
        let mut monitor = IdleMonitor::new(&self.config.idle);
        let mut buf = vec![0u8; 8192];

        loop {
            if !self.shared.running.load(Ordering::Acquire) {
                break;
            }
            match tokio::time::timeout(READ_POLL, read_chunk(pty.master(), &mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    self.ingest(&buf[..n]);
                    self.check_idle(&mut monitor, true);
                }
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => break,
                Ok(Err(e)) => {
                    warn!("pty read failed: {e}");
                    break;
                }
                Err(_elapsed) => self.check_idle(&mut monitor, false),
            }
        }

        // Child gone (or stop requested): reap and publish the exit.
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        let status = tokio::task::spawn_blocking({
            let pty = Arc::clone(&pty);
            move || pty.wait_blocking()
        })
        .await
        .ok()
        .and_then(|r| r.ok());
        *self.shared.exit_status.lock() = status;
        self.shared.pty.lock().take();
        if was_running {
            debug!(agent_id = %self.identity.agent_id, "child exited; removing registry record");
            self.registry.unregister(&self.identity.agent_id);
        }
    }

    fn ingest(&self, data: &[u8]) {
        self.shared.raw.lock().write(data);
        self.shared.screen.lock().feed(data);
        *self.shared.last_output.lock() = Some(Instant::now());
    }

    /// Evaluate the state machine. Called on every reader wake.
    fn check_idle(&self, monitor: &mut IdleMonitor, new_data: bool) {
        // DONE is sticky: new output resumes the normal machine, silence
        // relaxes straight to READY after the hold-down.
        {
            let mut state = self.shared.status.lock();
            if state.status == AgentStatus::Done {
                if !new_data {
                    let expired =
                        state.done_at.map(|at| at.elapsed() >= DONE_RELAX).unwrap_or(true);
                    if !expired {
                        return;
                    }
                    state.done_at = None;
                    drop(state);
                    self.set_status(AgentStatus::Ready);
                    return;
                }
                state.done_at = None;
            }
        }

        let last_output = *self.shared.last_output.lock();
        let (ready, waiting) = {
            let screen = self.shared.screen.lock();
            let ready = monitor.is_ready(&screen, last_output);
            let waiting = ready && {
                let context = screen.rendered_context();
                let tail: String = {
                    let count = context.chars().count();
                    let skip = count.saturating_sub(PATTERN_WINDOW);
                    context.chars().skip(skip).collect()
                };
                match self.config.waiting_regex.as_ref() {
                    Some(re) => re.is_match(&tail),
                    None => crate::output::is_input_required(&tail),
                }
            };
            (ready, waiting)
        };

        let next = if waiting {
            AgentStatus::Waiting
        } else if ready {
            AgentStatus::Ready
        } else {
            AgentStatus::Processing
        };
        self.set_status(next);
    }

    /// Apply a status; publishes to the registry only on change.
    pub(crate) fn set_status(&self, next: AgentStatus) {
        let changed = {
            let mut state = self.shared.status.lock();
            if state.status == next {
                false
            } else {
                state.status = next;
                if next != AgentStatus::Done {
                    state.done_at = None;
                }
                true
            }
        };
        if changed {
            self.publish_status(next);
            if next == AgentStatus::Ready {
                self.on_ready();
            }
        }
    }

    fn publish_status(&self, status: AgentStatus) {
        let seq = self.shared.status_seq.fetch_add(1, Ordering::AcqRel) + 1;
        // send_replace: the value must update even with no subscribers yet.
        self.shared.status_tx.send_replace(StatusEvent { seq, status });
        if let Err(e) = self.registry.update_status(&self.identity.agent_id, status) {
            debug!("registry status update failed: {e}");
        }
    }

    /// First-READY handshake: inject the identity instruction exactly once.
    fn on_ready(&self) {
        if self.shared.identity_sent.load(Ordering::Acquire) {
            return;
        }
        if self.identity.skip_initial_instructions {
            self.shared.identity_sent.store(true, Ordering::Release);
            self.shared.gate_tx.send_replace(true);
            return;
        }
        if self.shared.identity_sending.swap(true, Ordering::AcqRel) {
            // Another injection attempt is already in flight.
            return;
        }

        let controller = self.clone();
        tokio::spawn(async move {
            controller.send_identity().await;
        });
    }

    async fn send_identity(&self) {
        // Wait (bounded) for the master fd and the running flag.
        let deadline = Instant::now() + IDENTITY_WAIT_TIMEOUT;
        while self.pty().is_none() || !self.running() {
            if Instant::now() >= deadline {
                warn!("identity injection timed out waiting for the terminal");
                self.shared.identity_sending.store(false, Ordering::Release);
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let instruction = self.render_instruction();
        let marker = uuid::Uuid::new_v4().to_string();
        let payload = format!("[A2A:{}:synapse-system] {instruction}", &marker[..8]);

        match self.write(&payload).await {
            Ok(()) => {
                // Give the child a beat to redraw before opening the gate.
                tokio::time::sleep(POST_WRITE_IDLE_DELAY).await;
                self.shared.identity_sent.store(true, Ordering::Release);
                self.shared.gate_tx.send_replace(true);
                info!(agent_id = %self.identity.agent_id, "identity instruction injected");
            }
            Err(e) => {
                // Leave `identity_sent` false so the next READY retries.
                warn!("identity injection failed: {e}");
                self.shared.identity_sending.store(false, Ordering::Release);
            }
        }
    }

    fn render_instruction(&self) -> String {
        let template = self.identity.instruction.as_deref().unwrap_or(
            "You are agent {{agent_id}} on port {{port}}. \
             Peers are discoverable via the A2A registry; reply to A2A \
             messages with the task id shown in their [A2A:...] prefix.",
        );
        let mut text = template
            .replace("{{agent_id}}", &self.identity.agent_id)
            .replace("{{agent_name}}", self.identity.name.as_deref().unwrap_or(""))
            .replace("{{agent_role}}", self.identity.role.as_deref().unwrap_or(""))
            .replace("{{port}}", &self.identity.port.to_string());
        if let Some(ref skill_set) = self.identity.skill_set {
            text.push_str(&format!(" Active skill set: {skill_set}."));
        }
        text
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
