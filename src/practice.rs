//! Drives one practice session: feeds the session clock with time and turns
//! the effects it reports into chimes, keep-awake calls and intention fetches.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::ThreadRng;

use crate::chime::ChimePlayer;
use crate::intention::{IntentionBoard, IntentionFetcher, IntentionReply};
use crate::keep_awake::KeepAwake;
use crate::session::{Phase, SessionClock, SessionConfig, SessionEffect, SessionError};

/// Source of monotonic time
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|n| *n).unwrap_or_else(|_| Instant::now())
    }
}

pub struct Practice {
    session: SessionClock,
    board: IntentionBoard,
    clock: Box<dyn Clock>,
    chime: Box<dyn ChimePlayer>,
    keep_awake: Box<dyn KeepAwake>,
    fetcher: IntentionFetcher,
    rng: ThreadRng,
}

impl Practice {
    pub fn new(
        clock: Box<dyn Clock>,
        chime: Box<dyn ChimePlayer>,
        keep_awake: Box<dyn KeepAwake>,
        fetcher: IntentionFetcher,
    ) -> Self {
        Self {
            session: SessionClock::new(),
            board: IntentionBoard::new(),
            clock,
            chime,
            keep_awake,
            fetcher,
            rng: rand::thread_rng(),
        }
    }

    /// Must be called from the handler of the user's start action
    pub fn start(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        self.chime.unlock();
        let effects = self.session.start(config, self.clock.now(), &mut self.rng)?;
        self.board.begin_session();
        self.apply(effects);
        Ok(())
    }

    /// Called on every tick; only touches the session while it is running
    pub fn tick(&mut self) {
        if !self.session.is_running() {
            return;
        }
        let effects = self.session.poll(self.clock.now());
        self.apply(effects);
    }

    pub fn stop(&mut self) {
        let effects = self.session.stop();
        self.board.reset();
        self.apply(effects);
    }

    /// The platform may drop the keep-awake lock while the view is hidden
    pub fn on_focus_gained(&mut self) {
        if self.session.is_running() {
            self.request_keep_awake();
        }
    }

    pub fn on_intention(&mut self, reply: IntentionReply) -> bool {
        self.board.apply(reply, &mut self.rng)
    }

    pub fn session(&self) -> &SessionClock {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn intention(&self) -> Option<&str> {
        self.board.text()
    }

    pub fn intention_loading(&self) -> bool {
        self.board.is_loading()
    }

    fn apply(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::RequestKeepAwake => self.request_keep_awake(),
                SessionEffect::ReleaseKeepAwake => self.keep_awake.release(),
                SessionEffect::RequestIntention => {
                    let ticket = self.board.issue();
                    self.fetcher.fetch(ticket);
                }
                SessionEffect::ReminderFired { .. } => self.chime.play_gentle_chime(),
                SessionEffect::Finished => {
                    self.chime.play_finished_chime();
                    self.board.close();
                }
            }
        }
    }

    fn request_keep_awake(&mut self) {
        if let Err(err) = self.keep_awake.request() {
            tracing::warn!(error = %err, "keep-awake unavailable, continuing without it");
        }
    }
}
