use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

use crate::intention::IntentionReply;

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum BellEvent {
    Key(KeyEvent),
    Resize,
    /// The terminal window became visible/focused again
    FocusGained,
    Intention(IntentionReply),
    Tick,
}

/// Source of events (keyboard, resize, intention replies, ...)
pub trait BellEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<BellEvent, RecvTimeoutError>;

    /// Sender for background workers that post events into this source
    fn sender(&self) -> Sender<BellEvent>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<BellEvent>,
    rx: Receiver<BellEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    input_tx.send(BellEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => input_tx.send(BellEvent::Resize),
                Ok(CtEvent::FocusGained) => input_tx.send(BellEvent::FocusGained),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BellEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<BellEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<BellEvent> {
        self.tx.clone()
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-backed event source for tests
pub struct TestEventSource {
    tx: Sender<BellEvent>,
    rx: Receiver<BellEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BellEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<BellEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<BellEvent> {
        self.tx.clone()
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: BellEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    last_tick: Cell<Instant>,
}

impl<E: BellEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            last_tick: Cell::new(Instant::now()),
        }
    }

    /// Returns the next event, or Tick once an interval has passed since the
    /// previous Tick. Ticks keep their cadence however busy the event stream is.
    pub fn step(&self) -> BellEvent {
        let interval = self.ticker.interval();
        let since_tick = self.last_tick.get().elapsed();
        if since_tick >= interval {
            return self.tick();
        }

        match self.event_source.recv_timeout(interval - since_tick) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => self.tick(),
        }
    }

    fn tick(&self) -> BellEvent {
        self.last_tick.set(Instant::now());
        BellEvent::Tick
    }

    pub fn sender(&self) -> Sender<BellEvent> {
        self.event_source.sender()
    }
}
