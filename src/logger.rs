//! Thin wrapper over `env_logger`, initialized at most once per process.

use std::sync::atomic::{AtomicBool, Ordering};

static INIT: AtomicBool = AtomicBool::new(false);

/// Initializes logging at `trace` level (used with `--debug`).
pub fn init_logger_debug() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

/// Initializes logging at `error` level only.
pub fn init_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(false);
    }
}

fn init(debug: bool) {
    let default_level = if debug { "trace" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}
