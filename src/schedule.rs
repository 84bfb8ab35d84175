use rand::Rng;

/// Fraction of a bucket kept free at each edge when placing a random reminder.
pub const BUCKET_MARGIN: f64 = 0.1;

/// A single reminder instant, as an offset from session start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPoint {
    pub time_ms: u64,
    pub triggered: bool,
}

impl ReminderPoint {
    pub fn new(time_ms: u64) -> Self {
        Self {
            time_ms,
            triggered: false,
        }
    }

    /// Marks the point as fired. Returns false if it had already fired.
    pub fn trigger(&mut self) -> bool {
        if self.triggered {
            return false;
        }
        self.triggered = true;
        true
    }

    pub fn is_due(&self, elapsed_ms: u64) -> bool {
        !self.triggered && elapsed_ms >= self.time_ms
    }
}

/// Build the reminder schedule for a session.
///
/// Even spacing splits the session into `count + 1` equal intervals and puts a
/// reminder at the end of each of the first `count`. Random spacing splits it
/// into `count` buckets and draws one instant from the inner 80% of each.
///
/// Panics if `count` or `duration_ms` is zero: callers clamp their input first.
pub fn generate_schedule<R: Rng + ?Sized>(
    duration_ms: u64,
    count: u32,
    random: bool,
    rng: &mut R,
) -> Vec<ReminderPoint> {
    assert!(count >= 1, "reminder count must be at least 1");
    assert!(duration_ms > 0, "session duration must be positive");

    let mut points: Vec<ReminderPoint> = if random {
        (0..count)
            .map(|i| ReminderPoint::new(random_in_bucket(duration_ms, count, i, rng)))
            .collect()
    } else {
        let count = u64::from(count);
        (1..=count)
            .map(|i| ReminderPoint::new(i * duration_ms / (count + 1)))
            .collect()
    };

    points.sort_by_key(|p| p.time_ms);
    points
}

/// Inclusive bounds, in whole milliseconds, of the inner part of bucket `index`
pub fn bucket_bounds(duration_ms: u64, count: u32, index: u32) -> (u64, u64) {
    let width = duration_ms as f64 / f64::from(count);
    let start = width * f64::from(index);
    let lo = (start + width * BUCKET_MARGIN).ceil();
    let hi = (start + width * (1.0 - BUCKET_MARGIN)).floor();

    if lo > hi {
        // bucket narrower than a couple of milliseconds
        let mid = (start + width / 2.0).floor() as u64;
        (mid, mid)
    } else {
        (lo as u64, hi as u64)
    }
}

fn random_in_bucket<R: Rng + ?Sized>(duration_ms: u64, count: u32, index: u32, rng: &mut R) -> u64 {
    let (lo, hi) = bucket_bounds(duration_ms, count, index);
    rng.gen_range(lo..=hi)
}
