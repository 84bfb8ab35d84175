pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 120;
pub const MIN_REMINDERS: u32 = 1;
pub const MAX_REMINDERS: u32 = 30;

pub fn clamp_duration_minutes(minutes: i64) -> u32 {
    minutes.clamp(
        i64::from(MIN_DURATION_MINUTES),
        i64::from(MAX_DURATION_MINUTES),
    ) as u32
}

pub fn clamp_reminder_count(count: i64) -> u32 {
    count.clamp(i64::from(MIN_REMINDERS), i64::from(MAX_REMINDERS)) as u32
}

/// Parse user text as a whole number, falling back to `floor` when it isn't one.
/// Fractions are truncated; the result still needs clamping.
pub fn parse_lenient(input: &str, floor: i64) -> i64 {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return n;
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => floor,
    }
}

/// clap value parser for `--duration`: never rejects, always clamps
pub fn duration_arg(input: &str) -> Result<u32, String> {
    Ok(clamp_duration_minutes(parse_lenient(
        input,
        i64::from(MIN_DURATION_MINUTES),
    )))
}

/// clap value parser for `--reminders`: never rejects, always clamps
pub fn reminders_arg(input: &str) -> Result<u32, String> {
    Ok(clamp_reminder_count(parse_lenient(
        input,
        i64::from(MIN_REMINDERS),
    )))
}

/// mm:ss, rounding the remaining time up so 0:00 only shows once time is up
pub fn format_countdown(remaining_ms: u64) -> String {
    let secs = remaining_ms.div_ceil(1000);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
