//! The supervised child process: spawn, reap, signal, and subscribe.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use bitbox_core::{OutputEvent, ProcessId, ProcessInfo, ProcessStatus, SupervisorError};

use crate::sink::{OutputSink, TailReader};

/// Spawn-time options beyond the bare command and argument vector.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub current_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

/// Tunables for the tail/drain pipeline a subscription spawns, plus the
/// registry-level knobs (`id_retry_budget`, `temp_dir`) threaded down into
/// every handle a `Registry` spawns.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub tick_interval: Duration,
    pub read_buffer_size: usize,
    pub channel_capacity: usize,
    /// How many times `Registry::start` retries ID generation on collision
    /// before giving up. A collision this far into a 128-bit random space
    /// means something is structurally wrong (a broken RNG, not bad luck).
    pub id_retry_budget: usize,
    /// Directory new output sinks are created in. `None` uses the OS
    /// default temp directory (`std::env::temp_dir`).
    pub temp_dir: Option<PathBuf>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            read_buffer_size: 1024,
            channel_capacity: 256,
            id_retry_budget: 8,
            temp_dir: None,
        }
    }
}

struct State {
    exit_code: Option<i32>,
    subscriber_count: usize,
}

struct Shared {
    state: Mutex<State>,
    terminated: watch::Sender<bool>,
}

/// One supervised child process: its PID, its owned [`OutputSink`], and
/// its lifecycle state.
pub struct ProcessHandle {
    id: ProcessId,
    pid: u32,
    sink: OutputSink,
    shared: Arc<Shared>,
    options: SupervisorOptions,
    started_at: SystemTime,
}

impl ProcessHandle {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Path of the backing output-sink file, for diagnostics.
    pub fn sink_path(&self) -> &std::path::Path {
        self.sink.path()
    }

    /// A diagnostic snapshot: id, current status, and spawn time. Intended
    /// for logging and introspection, not lifecycle control — callers that
    /// need the status alone should prefer [`ProcessHandle::status`].
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo::new(self.id, self.status(), self.started_at)
    }

    /// Resolve `command` on the execution search path, spawn it with
    /// `args`, redirect both standard streams into a fresh [`OutputSink`],
    /// and start the background reaper.
    pub async fn spawn(
        id: ProcessId,
        command: &str,
        args: &[String],
        spawn_options: &SpawnOptions,
        options: SupervisorOptions,
    ) -> Result<Self, SupervisorError> {
        let resolved = which::which(command).map_err(|_| {
            debug!(process_id = %id, command, "command could not be resolved");
            SupervisorError::CommandNotFound(command.to_string())
        })?;

        let sink = OutputSink::create(options.temp_dir.as_deref())?;

        let mut cmd = Command::new(&resolved);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(sink.writer_stdio()?);
        cmd.stderr(sink.writer_stdio()?);
        cmd.kill_on_drop(true);

        if let Some(dir) = &spawn_options.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spawn_options.env {
            cmd.env(key, value);
        }

        // SAFETY: setsid() is async-signal-safe and runs before exec, in
        // the forked child only.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(SupervisorError::SpawnFailed)?;
        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::SpawnFailed(std::io::Error::other("child has no pid")))?;

        let (terminated_tx, _terminated_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                exit_code: None,
                subscriber_count: 0,
            }),
            terminated: terminated_tx,
        });

        let reaper_shared = shared.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let code = exit_code_of(status);
                    debug!(process_id = %id, pid, code, "reaper recorded child exit");
                    record_exit(&reaper_shared, code);
                }
                Err(e) => {
                    // The wait call itself failed (e.g. the child was
                    // reaped out from under us). There is no real exit
                    // code to report; -1 keeps the handle from being
                    // stuck `Running` forever and reads as signal-killed.
                    warn!(process_id = %id, pid, error = %e, "wait failed; recording fallback exit code -1");
                    record_exit(&reaper_shared, -1);
                }
            }
        });

        Ok(Self {
            id,
            pid,
            sink,
            shared,
            options,
            started_at: SystemTime::now(),
        })
    }

    /// Send an unconditional kill to the child's process group and block
    /// until the reaper has recorded the terminal state. Idempotent: a
    /// process already terminated (by a prior `stop()` or naturally) is
    /// reported as success, not failure.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let already_terminal = self.shared.state.lock().unwrap().exit_code.is_some();
        if !already_terminal {
            // SAFETY: `-pid` targets the process group `spawn` created via
            // setsid(); this is a plain signal-delivery syscall.
            let ret = unsafe { libc::kill(-(self.pid as i32), libc::SIGKILL) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    warn!(process_id = %self.id, pid = self.pid, error = %err, "signal delivery failed");
                    return Err(SupervisorError::SignalFailed(err));
                }
                // ESRCH: already gone. Fall through and wait for the
                // reaper to record it.
            }
        }

        let mut rx = self.shared.terminated.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Non-blocking snapshot of lifecycle state.
    pub fn status(&self) -> ProcessStatus {
        match self.shared.state.lock().unwrap().exit_code {
            None => ProcessStatus::Running,
            Some(code) => ProcessStatus::from_exit_code(code),
        }
    }

    /// Open a new subscription: a lazy sequence of [`OutputEvent`]s
    /// starting from offset 0 in the sink, terminated by exactly one
    /// `Exit`. Safe to call after the child has already terminated.
    pub async fn subscribe(&self) -> Result<Subscription, SupervisorError> {
        let tail = self.sink.open_tail().await?;
        let cancel_rx = self.shared.terminated.subscribe();
        let (tx, rx) = mpsc::channel(self.options.channel_capacity);

        {
            let mut state = self.shared.state.lock().unwrap();
            state.subscriber_count += 1;
        }
        debug!(process_id = %self.id, "subscriber attached");

        let shared = self.shared.clone();
        let id = self.id;
        let tick = self.options.tick_interval;
        let buf_size = self.options.read_buffer_size;
        tokio::spawn(async move {
            run_tail_and_drain(tail, cancel_rx, tx, shared.clone(), buf_size, tick).await;
            let mut state = shared.state.lock().unwrap();
            state.subscriber_count = state.subscriber_count.saturating_sub(1);
            debug!(process_id = %id, "subscriber detached");
        });

        Ok(Subscription { rx })
    }
}

fn record_exit(shared: &Shared, code: i32) {
    {
        let mut state = shared.state.lock().unwrap();
        if state.exit_code.is_some() {
            unreachable!("exit code recorded more than once: the reaper ran twice");
        }
        state.exit_code = Some(code);
    }
    // The reaper records the exit *before* firing cancellation, so every
    // tail loop observing cancellation may assume the child is reaped and
    // no further writes will occur.
    let _ = shared.terminated.send(true);
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        None => -status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

async fn run_tail_and_drain(
    mut tail: TailReader,
    mut cancel_rx: watch::Receiver<bool>,
    tx: mpsc::Sender<OutputEvent>,
    shared: Arc<Shared>,
    buf_size: usize,
    tick: Duration,
) {
    let mut buf = vec![0u8; buf_size];

    'tail: loop {
        loop {
            match tail.read_chunk(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(OutputEvent::Chunk(buf[..n].to_vec())).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "tail read error; ending subscription early");
                    return;
                }
            }
        }

        if *cancel_rx.borrow() {
            break 'tail;
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() {
                    break 'tail;
                }
            }
        }
    }

    // Drain phase: the child is reaped, so a `0` read here is true EOF,
    // not "no data yet".
    loop {
        match tail.read_chunk(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(OutputEvent::Chunk(buf[..n].to_vec())).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "drain read error; ending subscription without an exit event");
                return;
            }
        }
    }

    let code = shared.state.lock().unwrap().exit_code;
    if let Some(code) = code {
        let _ = tx.send(OutputEvent::Exit(code)).await;
    }
}

/// A subscriber's lazy sequence of output events: zero or more `Chunk`s
/// in sink byte order, then exactly one `Exit`, then the end.
pub struct Subscription {
    rx: mpsc::Receiver<OutputEvent>,
}

impl Subscription {
    /// Await the next event, or `None` once the sequence has ended.
    pub async fn recv(&mut self) -> Option<OutputEvent> {
        self.rx.recv().await
    }

    /// Drain the whole subscription into a `(concatenated chunks, exit
    /// code)` pair. Convenience for tests and simple callers; panics if
    /// the sequence ends without an `Exit` event (a contract violation).
    pub async fn collect_to_exit(mut self) -> (Vec<u8>, i32) {
        let mut bytes = Vec::new();
        loop {
            match self.recv().await {
                Some(OutputEvent::Chunk(chunk)) => bytes.extend_from_slice(&chunk),
                Some(OutputEvent::Exit(code)) => return (bytes, code),
                None => panic!("subscription ended without an Exit event"),
            }
        }
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
