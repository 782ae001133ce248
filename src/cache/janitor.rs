//! Lifecycle of the background sweep thread.
//!
//! The janitor is idle until the first value is stored. It then wakes up once per interval and
//! runs a sweep pass, until a pass finds the cache empty and stops it again. The next stored value
//! starts a fresh thread.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct JanitorState {
    running: bool,
    generation: u64,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Signal {
    state: Mutex<JanitorState>,
    wakeup: Condvar,
}

pub(crate) struct Janitor {
    interval: Duration,
    signal: Arc<Signal>,
}

impl Janitor {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            signal: Arc::default(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.signal.state.lock().running
    }

    /// Starts the background thread unless one is already running.
    ///
    /// `pass` runs once per interval and returns `false` once the thread should exit.
    pub(crate) fn start<F>(&self, pass: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let mut state = self.signal.state.lock();
        if state.running || state.shutdown {
            return;
        }

        state.running = true;
        state.generation += 1;
        let generation = state.generation;

        let signal = Arc::clone(&self.signal);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(String::from("expiring-cache-janitor"))
            .spawn(move || run(&signal, generation, interval, pass));

        match spawned {
            Ok(_) => tracing::debug!(generation, ?interval, "janitor started"),
            Err(err) => {
                state.running = false;
                tracing::error!(error = %err, "failed to spawn janitor thread");
            }
        }
    }

    /// Marks the janitor as stopped if `idle` holds.
    ///
    /// `idle` is evaluated while the state lock is held, so a concurrent [`Janitor::start`] either
    /// happens before and is seen by `idle`, or happens after and starts a new thread.
    pub(crate) fn stop_if(&self, idle: impl FnOnce() -> bool) -> bool {
        let mut state = self.signal.state.lock();
        if !idle() {
            return false;
        }

        if state.running {
            state.running = false;
            self.signal.wakeup.notify_all();
            tracing::debug!(generation = state.generation, "janitor stopped");
        }
        true
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        let mut state = self.signal.state.lock();
        state.shutdown = true;
        state.running = false;
        self.signal.wakeup.notify_all();
    }
}

impl fmt::Debug for Janitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Janitor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run<F>(signal: &Signal, generation: u64, interval: Duration, mut pass: F)
where
    F: FnMut() -> bool,
{
    let is_current =
        |state: &JanitorState| !state.shutdown && state.running && state.generation == generation;

    let _exit = ExitGuard { signal, generation };

    loop {
        {
            let mut state = signal.state.lock();
            // an interval past the end of time only wakes up on stop or shutdown
            let deadline = Instant::now().checked_add(interval);

            while is_current(&*state) {
                match deadline {
                    Some(deadline) => {
                        if signal.wakeup.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                    None => signal.wakeup.wait(&mut state),
                }
            }

            if !is_current(&*state) {
                tracing::trace!(generation, "janitor thread exits");
                return;
            }
        }

        if !pass() {
            tracing::trace!(generation, "janitor thread exits");
            return;
        }
    }
}

/// Marks the janitor as idle when its thread ends, including by a panicking pass, so the next
/// stored value can start a new one.
struct ExitGuard<'a> {
    signal: &'a Signal,
    generation: u64,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.signal.state.lock();
        if state.generation == self.generation {
            state.running = false;
        }
    }
}
