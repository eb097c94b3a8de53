/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Periodic closing of idle pooled connections.
//!
//! Services close connections that sat idle for a while on their side, and reusing one of those
//! fails the next request. An [`IdleConnectionReaper`] sweeps every registered
//! [`ConnectionPool`] on a background thread so connections are closed locally first.

use smithy_http::error::BoxError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const DEFAULT_PERIOD: Duration = Duration::from_secs(60);
const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60);
const THREAD_NAME: &str = "idle-connection-reaper";

/// A pool of connections the reaper can sweep
pub trait ConnectionPool: Send + Sync {
    /// Closes every connection that has been idle for at least `idle`
    fn close_idle_connections(&self, idle: Duration) -> Result<(), BoxError>;
}

/// A pool that could not be swept
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReaperError {
    /// Closing idle connections returned an error
    #[error("failed to close idle connections: {0}")]
    CloseFailed(#[source] BoxError),

    /// Closing idle connections panicked
    #[error("closing idle connections panicked")]
    Panicked,
}

#[derive(Default)]
struct State {
    pools: Vec<Arc<dyn ConnectionPool>>,
    running: bool,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    state: Mutex<State>,
    wake: Condvar,
    period: Duration,
    idle_threshold: Duration,
    threads_started: AtomicUsize,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Supervisor of a sweep thread shared by any number of connection pools.
///
/// The thread starts with the first registered pool and stops when the last one unregisters.
/// Clones share the same thread and pools.
#[derive(Clone)]
pub struct IdleConnectionReaper {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IdleConnectionReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("IdleConnectionReaper")
            .field("period", &self.inner.period)
            .field("idle_threshold", &self.inner.idle_threshold)
            .field("pools", &state.pools.len())
            .field("running", &state.running)
            .finish()
    }
}

impl Default for IdleConnectionReaper {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleConnectionReaper {
    /// Sweeps every 60 seconds, closing connections idle for 60 seconds or more
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_PERIOD, DEFAULT_IDLE_THRESHOLD)
    }

    /// Sweeps every `period`, closing connections idle for `idle_threshold` or more
    pub fn with_settings(period: Duration, idle_threshold: Duration) -> Self {
        IdleConnectionReaper {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                wake: Condvar::new(),
                period,
                idle_threshold,
                threads_started: AtomicUsize::new(0),
            }),
        }
    }

    /// Adds `pool` to the sweep, starting the sweep thread if needed.
    ///
    /// Returns false if the pool was already registered.
    pub fn register(&self, pool: Arc<dyn ConnectionPool>) -> bool {
        let mut state = self.inner.state();
        if state.pools.iter().any(|p| same_pool(p, &pool)) {
            return false;
        }
        state.pools.push(pool);
        if !state.running {
            // a thread from a previous generation exits on its own once it observes the bump
            state.handle = None;
            state.generation += 1;
            let generation = state.generation;
            let inner = self.inner.clone();
            let spawned = std::thread::Builder::new()
                .name(THREAD_NAME.to_string())
                .spawn(move || run(inner, generation));
            match spawned {
                Ok(handle) => {
                    state.running = true;
                    state.handle = Some(handle);
                    self.inner.threads_started.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to start idle connection reaper");
                }
            }
        }
        true
    }

    /// Removes `pool` from the sweep, stopping the sweep thread when no pools remain.
    ///
    /// Returns false if the pool was not registered.
    pub fn unregister(&self, pool: &Arc<dyn ConnectionPool>) -> bool {
        let mut state = self.inner.state();
        let before = state.pools.len();
        state.pools.retain(|p| !same_pool(p, pool));
        if state.pools.len() == before {
            return false;
        }
        if state.pools.is_empty() && state.running {
            state.running = false;
            state.generation += 1;
            let handle = state.handle.take();
            drop(state);
            self.inner.wake.notify_all();
            if let Some(handle) = handle {
                // the last pool can be dropped from within a sweep
                if handle.thread().id() != std::thread::current().id() {
                    let _ = handle.join();
                }
            }
        }
        true
    }

    /// True while the sweep thread runs
    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Number of registered pools
    pub fn pool_count(&self) -> usize {
        self.inner.state().pools.len()
    }

    /// Number of sweep threads started over the lifetime of this reaper
    pub fn threads_started(&self) -> usize {
        self.inner.threads_started.load(Ordering::SeqCst)
    }

    /// Sweeps every registered pool once, on the calling thread
    pub fn sweep(&self) {
        sweep(&self.inner);
    }
}

fn same_pool(a: &Arc<dyn ConnectionPool>, b: &Arc<dyn ConnectionPool>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn run(inner: Arc<Inner>, generation: u64) {
    tracing::debug!(period = ?inner.period, "idle connection reaper started");
    loop {
        let deadline = Instant::now() + inner.period;
        let mut state = inner.state();
        loop {
            if state.generation != generation {
                tracing::debug!("idle connection reaper stopped");
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = inner
                .wake
                .wait_timeout(state, deadline - now)
                .map(|(state, _)| state)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        drop(state);
        sweep(&inner);
    }
}

fn sweep(inner: &Inner) {
    let pools = inner.state().pools.clone();
    for pool in pools {
        let result = catch_unwind(AssertUnwindSafe(|| {
            pool.close_idle_connections(inner.idle_threshold)
        }));
        let err = match result {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => ReaperError::CloseFailed(err),
            Err(_) => ReaperError::Panicked,
        };
        tracing::warn!(error = %err, "idle connection sweep failed for a pool");
    }
}
