use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const BELL: &str = "\x07";
const FINISHED_RINGS: usize = 3;
const FINISHED_RING_GAP: Duration = Duration::from_millis(400);

/// Something that can make the session's sounds
pub trait ChimePlayer {
    /// Called synchronously from the key press that starts a session, for
    /// players that may only begin producing sound after a user action.
    fn unlock(&mut self) {}
    fn play_gentle_chime(&mut self);
    fn play_finished_chime(&mut self);
}

/// Rings the terminal bell
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring() {
        let mut out = io::stdout();
        if let Err(err) = out.write_all(BELL.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!(error = %err, "could not ring terminal bell");
        }
    }
}

impl ChimePlayer for TerminalBell {
    fn play_gentle_chime(&mut self) {
        Self::ring();
    }

    fn play_finished_chime(&mut self) {
        Self::ring();
        thread::spawn(|| {
            for _ in 1..FINISHED_RINGS {
                thread::sleep(FINISHED_RING_GAP);
                Self::ring();
            }
        });
    }
}

/// For `--quiet`
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentChime;

impl ChimePlayer for SilentChime {
    fn play_gentle_chime(&mut self) {}
    fn play_finished_chime(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chime {
    Unlock,
    Gentle,
    Finished,
}

/// Records every call; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingChime {
    log: Arc<Mutex<Vec<Chime>>>,
}

impl RecordingChime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Chime> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count(&self, chime: Chime) -> usize {
        self.calls().iter().filter(|c| **c == chime).count()
    }

    fn push(&self, chime: Chime) {
        if let Ok(mut log) = self.log.lock() {
            log.push(chime);
        }
    }
}

impl ChimePlayer for RecordingChime {
    fn unlock(&mut self) {
        self.push(Chime::Unlock);
    }

    fn play_gentle_chime(&mut self) {
        self.push(Chime::Gentle);
    }

    fn play_finished_chime(&mut self) {
        self.push(Chime::Finished);
    }
}
