// Library surface for headless/integration tests and reuse.
// The terminal UI itself lives in the binary (main.rs, ui).
pub mod app_dirs;
pub mod chime;
pub mod config;
pub mod intention;
pub mod keep_awake;
pub mod logging;
pub mod practice;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod util;

/// How often the running session is polled and the screen redrawn
pub const TICK_RATE_MS: u64 = 100;
