//! Debug logging switch shared by the library and the CLI.
//!
//! Lines carry the elapsed time since the switch was flipped and the name of
//! the emitting thread, so decode workers and the coordinating thread can be
//! told apart in interleaved output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

static DEBUG: AtomicBool = AtomicBool::new(false);
static STARTED: OnceLock<Instant> = OnceLock::new();

pub fn enable() {
    STARTED.get_or_init(Instant::now);
    DEBUG.store(true, Ordering::Relaxed);
}

pub fn is_on() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn prefix() -> String {
    let secs = STARTED
        .get()
        .map(|t| t.elapsed().as_secs_f64())
        .unwrap_or(0.0);
    let thread = std::thread::current();
    format!("{:8.3}s {}", secs, thread.name().unwrap_or("?"))
}

macro_rules! dbg_log {
    ($($arg:tt)*) => {
        if $crate::debug::is_on() {
            eprintln!("DEBUG {} {}", $crate::debug::prefix(), format!($($arg)*));
        }
    };
}
pub(crate) use dbg_log;
