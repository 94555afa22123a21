//! Process-wide exclusive access to the script interpreter.
//!
//! Every engine in the process enters the interpreter through
//! [`InterpreterGuard::acquire`], so at most one script runs at a time even
//! when resolvers live on different threads. The runtime is initialised
//! lazily, once, by the first acquisition and is never torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use tracing::info;

use crate::diagnostics::PacDomain;

static RUNTIME: OnceLock<Mutex<RuntimeState>> = OnceLock::new();
static INITIALISED: AtomicBool = AtomicBool::new(false);
static HELD: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Default)]
struct RuntimeState {
    initialised_at: Option<Instant>,
    entries: u64,
}

/// Scoped claim on the interpreter. Released when dropped.
///
/// The guard is neither `Clone` nor `Send`: it must be released by the
/// thread that acquired it. Acquiring a second guard on a thread that
/// already holds one deadlocks.
#[must_use = "the interpreter is released as soon as the guard is dropped"]
pub struct InterpreterGuard {
    state: MutexGuard<'static, RuntimeState>,
}

impl InterpreterGuard {
    /// Block until no other guard is outstanding.
    pub fn acquire() -> Self {
        let lock = RUNTIME.get_or_init(|| Mutex::new(RuntimeState::default()));
        // A panic inside a previous holder leaves nothing half-written here.
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if state.initialised_at.is_none() {
            state.initialised_at = Some(Instant::now());
            INITIALISED.store(true, Ordering::Release);
            info!(domain = %PacDomain::Runtime, "Interpreter runtime initialised");
        }
        state.entries += 1;
        HELD.store(true, Ordering::Release);
        Self { state }
    }

    /// Number of interpreter entries in this process, this one included.
    pub fn entries(&self) -> u64 {
        self.state.entries
    }

    pub fn initialised_at(&self) -> Option<Instant> {
        self.state.initialised_at
    }

    /// Whether any guard has ever been acquired in this process.
    pub fn is_initialised() -> bool {
        INITIALISED.load(Ordering::Acquire)
    }

    /// Whether some thread holds a guard right now.
    pub fn is_held() -> bool {
        HELD.load(Ordering::Acquire)
    }
}

impl Drop for InterpreterGuard {
    fn drop(&mut self) {
        // Cleared before `state` unlocks, so the next holder's store wins.
        HELD.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for InterpreterGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterGuard").field("entries", &self.state.entries).finish()
    }
}
