//! Best-effort "keep the display on" while a session runs.
//!
//! Failures here never affect timing: callers log them and carry on.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeepAwakeError {
    #[error("keep-awake is not supported on this platform")]
    Unsupported,
    #[error("could not start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited right away ({status})")]
    Exited {
        program: &'static str,
        status: ExitStatus,
    },
}

/// How long a fresh inhibitor gets to refuse the request before it counts as held
const SETTLE: Duration = Duration::from_millis(50);

pub trait KeepAwake {
    /// Acquire the lock. Requesting while already held is a no-op.
    fn request(&mut self) -> Result<(), KeepAwakeError>;
    /// Release the lock. Releasing while not held is a no-op.
    fn release(&mut self);
    fn is_held(&self) -> bool;
}

/// Holds an inhibitor child process for as long as the lock is held
/// (`systemd-inhibit` on Linux, `caffeinate` on macOS).
#[derive(Debug, Default)]
pub struct InhibitorKeepAwake {
    child: Option<Child>,
    custom: Option<(&'static str, Vec<&'static str>)>,
}

impl InhibitorKeepAwake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `program args..` instead of the platform inhibitor
    pub fn with_command(program: &'static str, args: &[&'static str]) -> Self {
        Self {
            child: None,
            custom: Some((program, args.to_vec())),
        }
    }

    fn command(&self) -> Result<(&'static str, Command), KeepAwakeError> {
        if let Some((program, args)) = &self.custom {
            let mut cmd = Command::new(program);
            cmd.args(args);
            Ok((*program, cmd))
        } else if cfg!(target_os = "linux") {
            let mut cmd = Command::new("systemd-inhibit");
            cmd.args([
                "--what=idle:sleep",
                "--who=mindbell",
                "--why=mindfulness session in progress",
                "sleep",
                "infinity",
            ]);
            Ok(("systemd-inhibit", cmd))
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("caffeinate");
            cmd.arg("-d");
            Ok(("caffeinate", cmd))
        } else {
            Err(KeepAwakeError::Unsupported)
        }
    }
}

impl KeepAwake for InhibitorKeepAwake {
    fn request(&mut self) -> Result<(), KeepAwakeError> {
        if let Some(child) = self.child.as_mut() {
            // the inhibitor may have been killed behind our back
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
            self.child = None;
        }

        let (program, mut cmd) = self.command()?;
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| KeepAwakeError::Spawn { program, source })?;

        // inhibitors refused by the session manager exit immediately
        thread::sleep(SETTLE);
        if let Ok(Some(status)) = child.try_wait() {
            return Err(KeepAwakeError::Exited { program, status });
        }
        tracing::debug!(program, pid = child.id(), "keep-awake acquired");
        self.child = Some(child);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!("keep-awake released");
        }
    }

    fn is_held(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for InhibitorKeepAwake {
    fn drop(&mut self) {
        self.release();
    }
}

/// For `--no-keep-awake`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAwake;

impl KeepAwake for NoKeepAwake {
    fn request(&mut self) -> Result<(), KeepAwakeError> {
        Ok(())
    }

    fn release(&mut self) {}

    fn is_held(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct FakeState {
    held: bool,
    requests: usize,
    releases: usize,
    fail: bool,
}

/// In-memory keep-awake; clones share state so tests can inspect it
#[derive(Debug, Default, Clone)]
pub struct FakeKeepAwake {
    state: Arc<Mutex<FakeState>>,
}

impl FakeKeepAwake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request fails as if the platform had no support
    pub fn failing() -> Self {
        let fake = Self::default();
        if let Ok(mut s) = fake.state.lock() {
            s.fail = true;
        }
        fake
    }

    pub fn requests(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or(0)
    }

    pub fn releases(&self) -> usize {
        self.state.lock().map(|s| s.releases).unwrap_or(0)
    }

    /// Simulate the platform dropping the lock (e.g. the view was hidden)
    pub fn revoke(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.held = false;
        }
    }
}

impl KeepAwake for FakeKeepAwake {
    fn request(&mut self) -> Result<(), KeepAwakeError> {
        let mut s = self.state.lock().map_err(|_| KeepAwakeError::Unsupported)?;
        s.requests += 1;
        if s.fail {
            return Err(KeepAwakeError::Unsupported);
        }
        s.held = true;
        Ok(())
    }

    fn release(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.releases += 1;
            s.held = false;
        }
    }

    fn is_held(&self) -> bool {
        self.state.lock().map(|s| s.held).unwrap_or(false)
    }
}
