use crate::Error;
use std::{
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

/// Decides what a successful wait does to an [`Event`]'s signal.
#[derive(Copy, Clone)]
pub enum ResetPolicy {
    /// The successful waiter consumes the signal: the event falls back to
    /// unsignaled and every other waiter keeps blocking.
    Auto,
    /// The signal persists, releasing all current and future waiters, until
    /// [`Event::reset`] is called.
    Manual,
}

impl ResetPolicy {
    /// Convenience method to check the concrete policy.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(&self, Self::Manual)
    }
}

/// A binary latch that producer threads signal and consumer threads wait on.
///
/// The latch is a boolean under the event's own mutex; waiters block on the
/// event's condition variable. Which of the two [`ResetPolicy`] flavors an
/// event has is fixed at construction.
///
/// `Event` is a cheaply clonable handle; all clones refer to the same latch.
/// Dropping the last clone releases the underlying primitives.
///
/// ## Example: release a group of workers at once
///
/// ```rust
/// use event_sync::{Event, ResetPolicy};
/// use std::thread;
///
/// let go = Event::new(ResetPolicy::Manual, false);
///
/// let workers: Vec<_> = (0..4)
///     .map(|i| {
///         let go = go.clone();
///         thread::spawn(move || {
///             // block here until the starting shot:
///             go.wait().unwrap();
///             println!("worker {i} running");
///         })
///     })
///     .collect();
///
/// // manual-reset: one signal releases every worker, present or late
/// go.signal().unwrap();
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// ```
pub struct Event(Arc<Inner>);

struct Inner {
    latch: Mutex<bool>,
    cvar: Condvar,
    policy: ResetPolicy,
}

impl Event {
    /// Creates an event with the given reset policy and initial latch state.
    #[must_use]
    pub fn new(policy: ResetPolicy, initially_signaled: bool) -> Self {
        Self(Arc::new(Inner {
            latch: Mutex::new(initially_signaled),
            cvar: Condvar::new(),
            policy,
        }))
    }

    /// Latches the event to signaled and wakes waiters.
    ///
    /// A manual-reset event releases every waiter, so its condition variable
    /// is broadcast. An auto-reset signal can be consumed by at most one
    /// waiter, so only one is notified.
    ///
    /// ## Errors
    ///
    /// This function will return an error if the event's mutex was poisoned
    /// by a panicking thread.
    pub fn signal(&self) -> Result<(), Error> {
        let mut latch = self.0.latch.lock()?;
        *latch = true;
        if self.0.policy.is_manual() {
            self.0.cvar.notify_all();
        } else {
            self.0.cvar.notify_one();
        }
        drop(latch);
        Ok(())
    }

    /// Resets the event to unsignaled. Waiters are not notified.
    ///
    /// ## Errors
    ///
    /// This function will return an error if the event's mutex was poisoned
    /// by a panicking thread.
    pub fn reset(&self) -> Result<(), Error> {
        *self.0.latch.lock()? = false;
        Ok(())
    }

    /// Signals the event, then immediately resets it.
    ///
    /// The two steps are not atomic: a waiter that starts waiting between
    /// them misses the pulse entirely, and with no waiter present the pulse
    /// leaves no observable trace.
    ///
    /// ## Errors
    ///
    /// This function will return an error if the event's mutex was poisoned
    /// by a panicking thread.
    pub fn pulse(&self) -> Result<(), Error> {
        self.signal()?;
        self.reset()
    }

    /// Blocks the current thread until the event is signaled.
    ///
    /// Returns immediately if the event is already signaled. On an
    /// auto-reset event, a successful wait consumes the signal.
    ///
    /// ## Errors
    ///
    /// This function will return an error if the event's mutex was poisoned
    /// by a panicking thread.
    pub fn wait(&self) -> Result<(), Error> {
        self.wait_latch(None)
    }

    /// Like [`wait`](Self::wait), but gives up at `deadline`.
    ///
    /// A deadline in the past degenerates to a poll: a signaled event is
    /// still consumed and reported as success, an unsignaled one times out
    /// at once.
    ///
    /// ## Errors
    ///
    /// This function will return [`Error::Timeout`] if the deadline elapsed
    /// before the event was signaled, or [`Error::Poisoned`] if the event's
    /// mutex was poisoned by a panicking thread.
    pub fn wait_deadline(&self, deadline: Instant) -> Result<(), Error> {
        self.wait_latch(Some(deadline))
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// ## Errors
    ///
    /// This function will return [`Error::Timeout`] if the timeout elapsed
    /// before the event was signaled, or [`Error::Poisoned`] if the event's
    /// mutex was poisoned by a panicking thread.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), Error> {
        self.wait_latch(Some(Instant::now() + timeout))
    }

    pub(crate) fn wait_latch(&self, deadline: Option<Instant>) -> Result<(), Error> {
        let mut latch = self.0.latch.lock()?;
        loop {
            if *latch {
                if !self.0.policy.is_manual() {
                    *latch = false;
                }
                return Ok(());
            }
            latch = match deadline {
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        return Err(Error::Timeout);
                    }
                    // A timed-out wakeup still re-checks the latch once; the
                    // clock comparison above is what ends the wait.
                    self.0.cvar.wait_timeout(latch, at - now)?.0
                }
                None => self.0.cvar.wait(latch)?,
            };
        }
    }

    pub(crate) fn latch(&self) -> &Mutex<bool> {
        &self.0.latch
    }

    pub(crate) fn condvar(&self) -> &Condvar {
        &self.0.cvar
    }

    pub(crate) fn is_auto_reset(&self) -> bool {
        !self.0.policy.is_manual()
    }
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}
