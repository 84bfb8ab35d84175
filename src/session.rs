//! Session clock: the idle/running/finished state machine.
//!
//! Elapsed time is always recomputed from the instant the session started,
//! never accumulated per poll, so a poll that arrives late (suspended
//! terminal, sleeping laptop) catches up on everything it missed at once.

use std::time::Instant;

use chrono::{DateTime, Local};
use rand::Rng;
use thiserror::Error;

use crate::schedule::{generate_schedule, ReminderPoint};
use crate::util::{clamp_duration_minutes, clamp_reminder_count};

pub const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub duration_minutes: u32,
    pub reminder_count: u32,
    pub is_random: bool,
}

impl SessionConfig {
    /// Build a config, clamping out-of-range values to the nearest valid one
    pub fn clamped(duration_minutes: i64, reminder_count: i64, is_random: bool) -> Self {
        Self {
            duration_minutes: clamp_duration_minutes(duration_minutes),
            reminder_count: clamp_reminder_count(reminder_count),
            is_random,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_minutes) * MS_PER_MINUTE
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: 10,
            reminder_count: 3,
            is_random: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Running,
    Finished,
}

/// Side effects the clock asks its owner to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    RequestKeepAwake,
    ReleaseKeepAwake,
    RequestIntention,
    ReminderFired { index: usize, time_ms: u64 },
    Finished,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session can only be started when idle (currently {0})")]
    NotIdle(Phase),
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    phase: Phase,
    config: Option<SessionConfig>,
    started_at: Option<Instant>,
    started_wall: Option<DateTime<Local>>,
    duration_ms: u64,
    elapsed_ms: u64,
    schedule: Vec<ReminderPoint>,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            config: None,
            started_at: None,
            started_wall: None,
            duration_ms: 0,
            elapsed_ms: 0,
            schedule: Vec::new(),
        }
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        config: SessionConfig,
        now: Instant,
        rng: &mut R,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        self.begin(config, config.duration_ms(), now, rng)
    }

    fn begin<R: Rng + ?Sized>(
        &mut self,
        config: SessionConfig,
        duration_ms: u64,
        now: Instant,
        rng: &mut R,
    ) -> Result<Vec<SessionEffect>, SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::NotIdle(self.phase));
        }

        self.schedule = generate_schedule(duration_ms, config.reminder_count, config.is_random, rng);
        self.config = Some(config);
        self.duration_ms = duration_ms;
        self.started_at = Some(now);
        self.started_wall = Some(Local::now());
        self.elapsed_ms = 0;
        self.phase = Phase::Running;

        tracing::info!(
            duration_minutes = config.duration_minutes,
            reminders = config.reminder_count,
            random = config.is_random,
            "session started"
        );

        Ok(vec![
            SessionEffect::RequestKeepAwake,
            SessionEffect::RequestIntention,
        ])
    }

    /// Advance the session to `now`. Does nothing unless running.
    pub fn poll(&mut self, now: Instant) -> Vec<SessionEffect> {
        let (Phase::Running, Some(started_at)) = (self.phase, self.started_at) else {
            return Vec::new();
        };

        let duration_ms = self.duration_ms;
        let elapsed = now.saturating_duration_since(started_at).as_millis();
        let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);

        if elapsed >= duration_ms {
            self.elapsed_ms = duration_ms;
            self.phase = Phase::Finished;
            tracing::info!(
                fired = self.fired_count(),
                total = self.schedule.len(),
                "session finished"
            );
            return vec![SessionEffect::Finished, SessionEffect::ReleaseKeepAwake];
        }

        self.elapsed_ms = elapsed;

        let mut effects = Vec::new();
        for (index, point) in self.schedule.iter_mut().enumerate() {
            if point.is_due(elapsed) && point.trigger() {
                tracing::debug!(index, time_ms = point.time_ms, elapsed, "reminder fired");
                effects.push(SessionEffect::ReminderFired {
                    index,
                    time_ms: point.time_ms,
                });
                effects.push(SessionEffect::RequestIntention);
            }
        }
        effects
    }

    /// Return to idle from any phase, dropping all per-session state
    pub fn stop(&mut self) -> Vec<SessionEffect> {
        if self.phase != Phase::Idle {
            tracing::info!(phase = %self.phase, elapsed_ms = self.elapsed_ms, "session stopped");
        }
        self.phase = Phase::Idle;
        self.config = None;
        self.started_at = None;
        self.started_wall = None;
        self.duration_ms = 0;
        self.elapsed_ms = 0;
        self.schedule.clear();

        vec![SessionEffect::ReleaseKeepAwake]
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    pub fn schedule(&self) -> &[ReminderPoint] {
        &self.schedule
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn started_wall(&self) -> Option<DateTime<Local>> {
        self.started_wall
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.duration_ms().saturating_sub(self.elapsed_ms)
    }

    /// 0.0 ..= 1.0 of the session elapsed
    pub fn progress(&self) -> f64 {
        let total = self.duration_ms();
        if total == 0 {
            return 0.0;
        }
        (self.elapsed_ms as f64 / total as f64).min(1.0)
    }

    pub fn fired_count(&self) -> usize {
        self.schedule.iter().filter(|p| p.triggered).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn running_clock(config: SessionConfig, t0: Instant) -> SessionClock {
        let mut clock = SessionClock::new();
        clock.start(config, t0, &mut rng()).unwrap();
        clock
    }

    fn fired(effects: &[SessionEffect]) -> Vec<u64> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::ReminderFired { time_ms, .. } => Some(*time_ms),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_enters_running_with_schedule() {
        let t0 = Instant::now();
        let mut clock = SessionClock::new();
        let effects = clock
            .start(SessionConfig::clamped(10, 1, false), t0, &mut rng())
            .unwrap();

        assert_eq!(clock.phase(), Phase::Running);
        assert_eq!(clock.started_at(), Some(t0));
        assert!(clock.started_wall().is_some());
        assert_eq!(clock.schedule().len(), 1);
        assert_eq!(clock.schedule()[0].time_ms, 300_000);
        assert_eq!(
            effects,
            vec![
                SessionEffect::RequestKeepAwake,
                SessionEffect::RequestIntention
            ]
        );
    }

    #[test]
    fn start_is_rejected_unless_idle() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::default(), t0);
        let schedule_before = clock.schedule().to_vec();

        assert_matches!(
            clock.start(SessionConfig::default(), t0, &mut rng()),
            Err(SessionError::NotIdle(Phase::Running))
        );
        assert_eq!(clock.schedule(), schedule_before.as_slice());

        clock.poll(t0 + Duration::from_secs(3600));
        assert_matches!(
            clock.start(SessionConfig::default(), t0, &mut rng()),
            Err(SessionError::NotIdle(Phase::Finished))
        );
    }

    #[test]
    fn single_late_poll_fires_all_three_reminders() {
        let t0 = Instant::now();
        let mut clock = SessionClock::new();
        clock
            .begin(SessionConfig::clamped(1, 3, false), 10_000, t0, &mut rng())
            .unwrap();
        let times: Vec<u64> = clock.schedule().iter().map(|p| p.time_ms).collect();
        assert_eq!(times, vec![2_500, 5_000, 7_500]);

        let effects = clock.poll(t0 + Duration::from_millis(8_000));
        assert_eq!(
            effects,
            vec![
                SessionEffect::ReminderFired {
                    index: 0,
                    time_ms: 2_500
                },
                SessionEffect::RequestIntention,
                SessionEffect::ReminderFired {
                    index: 1,
                    time_ms: 5_000
                },
                SessionEffect::RequestIntention,
                SessionEffect::ReminderFired {
                    index: 2,
                    time_ms: 7_500
                },
                SessionEffect::RequestIntention,
            ]
        );
        assert!(clock.schedule().iter().all(|p| p.triggered));
        assert_eq!(clock.elapsed_ms(), 8_000);
        assert_eq!(clock.phase(), Phase::Running);

        clock.poll(t0 + Duration::from_millis(12_345));
        assert_eq!(clock.elapsed_ms(), 10_000);
        assert_eq!(clock.phase(), Phase::Finished);
        assert!(clock.schedule().iter().all(|p| p.triggered));
    }

    #[test]
    fn reminder_boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::clamped(10, 1, false), t0);

        assert!(fired(&clock.poll(t0 + Duration::from_millis(299_999))).is_empty());
        let effects = clock.poll(t0 + Duration::from_millis(300_000));
        assert_eq!(fired(&effects), vec![300_000]);
        assert!(effects.contains(&SessionEffect::RequestIntention));
        assert!(clock.schedule()[0].triggered);
    }

    #[test]
    fn each_reminder_fires_once() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::clamped(10, 1, false), t0);

        assert_eq!(fired(&clock.poll(t0 + Duration::from_secs(301))).len(), 1);
        assert!(clock.poll(t0 + Duration::from_secs(302)).is_empty());
        assert!(clock.poll(t0 + Duration::from_secs(400)).is_empty());
        assert!(clock.schedule()[0].triggered);
    }

    #[test]
    fn late_poll_catches_up_in_order() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::clamped(20, 4, false), t0);
        // reminders at 4, 8, 12, 16 minutes
        let effects = clock.poll(t0 + Duration::from_secs(13 * 60));

        assert_eq!(fired(&effects), vec![240_000, 480_000, 720_000]);
        assert_eq!(
            effects[..2],
            [
                SessionEffect::ReminderFired {
                    index: 0,
                    time_ms: 240_000
                },
                SessionEffect::RequestIntention
            ]
        );
        assert_eq!(clock.fired_count(), 3);
        assert!(!clock.schedule()[3].triggered);
    }

    #[test]
    fn finishing_forces_exact_elapsed() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::clamped(1, 1, false), t0);

        clock.poll(t0 + Duration::from_secs(30));
        let effects = clock.poll(t0 + Duration::from_secs(95));

        assert_eq!(
            effects,
            vec![SessionEffect::Finished, SessionEffect::ReleaseKeepAwake]
        );
        assert_eq!(clock.phase(), Phase::Finished);
        assert_eq!(clock.elapsed_ms(), 60_000);
        assert_eq!(clock.remaining_ms(), 0);
        assert_eq!(clock.progress(), 1.0);
        // schedule is kept for the summary
        assert_eq!(clock.schedule().len(), 1);
    }

    #[test]
    fn poll_is_noop_once_finished_or_idle() {
        let t0 = Instant::now();
        let mut idle = SessionClock::new();
        assert!(idle.poll(t0).is_empty());
        assert_eq!(idle.phase(), Phase::Idle);

        let mut clock = running_clock(SessionConfig::clamped(1, 1, false), t0);
        clock.poll(t0 + Duration::from_secs(61));
        assert!(clock.poll(t0 + Duration::from_secs(120)).is_empty());
        assert_eq!(clock.elapsed_ms(), 60_000);
    }

    #[test]
    fn finishing_poll_does_not_fire_pending_reminders() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::clamped(1, 3, false), t0);
        let effects = clock.poll(t0 + Duration::from_secs(60));
        assert!(fired(&effects).is_empty());
        assert_eq!(clock.fired_count(), 0);
    }

    #[test]
    fn start_then_stop_resets_everything() {
        let t0 = Instant::now();
        let mut clock = running_clock(SessionConfig::default(), t0);
        let effects = clock.stop();

        assert_eq!(effects, vec![SessionEffect::ReleaseKeepAwake]);
        assert_eq!(clock.phase(), Phase::Idle);
        assert!(clock.schedule().is_empty());
        assert_eq!(clock.elapsed_ms(), 0);
        assert_eq!(clock.started_at(), None);
        assert_eq!(clock.started_wall(), None);
        assert_eq!(clock.config(), None);
        assert_eq!(clock.duration_ms(), 0);
    }

    #[test]
    fn stop_when_idle_is_idempotent() {
        let mut clock = SessionClock::new();
        assert_eq!(clock.stop(), vec![SessionEffect::ReleaseKeepAwake]);
        assert_eq!(clock.stop(), vec![SessionEffect::ReleaseKeepAwake]);
        assert_eq!(clock.phase(), Phase::Idle);
        assert!(clock.schedule().is_empty());
        assert_eq!(clock.elapsed_ms(), 0);
    }

    #[test]
    fn clock_going_backwards_counts_as_zero_elapsed() {
        let t0 = Instant::now() + Duration::from_secs(5);
        let mut clock = running_clock(SessionConfig::default(), t0);
        assert!(clock.poll(t0 - Duration::from_secs(1)).is_empty());
        assert_eq!(clock.elapsed_ms(), 0);
    }

    #[test]
    fn clamped_config_stays_in_range() {
        let cfg = SessionConfig::clamped(0, 0, true);
        assert_eq!(cfg.duration_minutes, 1);
        assert_eq!(cfg.reminder_count, 1);
        assert_eq!(cfg.duration_ms(), 60_000);

        let cfg = SessionConfig::clamped(1000, 1000, false);
        assert_eq!(cfg.duration_minutes, 120);
        assert_eq!(cfg.reminder_count, 30);
    }
}
