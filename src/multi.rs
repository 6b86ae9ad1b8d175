//! Waiting on several events at once.
//!
//! A condition variable waits on exactly one mutex, so there is no direct
//! way to block on "any of these events" or "all of these events". The
//! coordinator here materializes one proxy waiter thread per target event;
//! each proxy blocks on its event's condition variable and reports
//! completion through a rendezvous shared by the whole call. The calling
//! thread sleeps on the rendezvous, applies the any/all policy to the
//! reported completions, and cancels and joins every proxy before it
//! returns, on every exit path.

use crate::{Error, Event};
use log::{debug, trace};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Instant,
};

/// Blocks until any one of `events` is signaled and returns its index.
///
/// If the winning event is auto-reset, its signal is consumed on the
/// caller's behalf. When several events are ready at the same time, the
/// lowest index wins. An empty slice succeeds immediately with index 0; a
/// one-element slice is equivalent to waiting on that event directly. With
/// `deadline: None` the call blocks indefinitely.
///
/// ## Errors
///
/// This function will return [`Error::Timeout`] if the deadline elapsed
/// first, [`Error::Spawn`] if a waiter thread could not be spawned, or
/// [`Error::Poisoned`] if a mutex involved in the wait was poisoned by a
/// panicking thread. On every error path all waiter threads have been
/// canceled and joined before the call returns.
pub fn wait_any(events: &[Event], deadline: Option<Instant>) -> Result<usize, Error> {
    match events {
        [] => Ok(0),
        [event] => event.wait_latch(deadline).map(|()| 0),
        _ => coordinate(events, false, deadline),
    }
}

/// Blocks until every one of `events` has been observed signaled at a
/// single point in time, under all of their locks at once.
///
/// Auto-reset events are consumed as a group at that point; manual-reset
/// events stay signaled. An empty slice succeeds immediately; a one-element
/// slice is equivalent to waiting on that event directly. With
/// `deadline: None` the call blocks indefinitely.
///
/// ## Errors
///
/// This function will return [`Error::Timeout`] if the deadline elapsed
/// first, [`Error::Spawn`] if a waiter thread could not be spawned, or
/// [`Error::Poisoned`] if a mutex involved in the wait was poisoned by a
/// panicking thread. On every error path all waiter threads have been
/// canceled and joined before the call returns, and no event has been
/// consumed.
pub fn wait_all(events: &[Event], deadline: Option<Instant>) -> Result<(), Error> {
    match events {
        [] => Ok(()),
        [event] => event.wait_latch(deadline),
        _ => coordinate(events, true, deadline).map(|_| ()),
    }
}

/// What a proxy observed when its wait loop ended.
enum ProxyStatus {
    Signaled,
    Canceled,
    Poisoned,
}

/// How one round of the coordinator loop ended.
enum Outcome {
    /// The wait is satisfied; for `wait_any` this is the consumed index.
    Win(usize),
    /// Group verification lost a race; respawn the proxies and go again.
    Restart,
}

/// Mutex + condition variable shared by the coordinator and all proxies of
/// one composite wait. The mutex guards the per-proxy completion bits.
struct Rendezvous {
    done: Mutex<Vec<bool>>,
    cvar: Condvar,
}

impl Rendezvous {
    fn new(count: usize) -> Self {
        Self {
            done: Mutex::new(vec![false; count]),
            cvar: Condvar::new(),
        }
    }

    /// Locks the completion bits, recovering the guard if the mutex is
    /// poisoned. Teardown must run to completion even after a panic
    /// somewhere else, and the bits are plain booleans that cannot be left
    /// half-updated.
    fn lock_done(&self) -> MutexGuard<'_, Vec<bool>> {
        self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State shared between the coordinator and one proxy thread.
struct ProxyShared {
    event: Event,
    rendezvous: Arc<Rendezvous>,
    index: usize,
    canceled: AtomicBool,
}

impl ProxyShared {
    /// Asks the proxy to abandon its wait and wakes it.
    ///
    /// The store happens under the target event's mutex, which serializes it
    /// with the proxy's check-then-sleep cycle: the proxy either holds the
    /// lock and will observe the flag before it sleeps, or it is asleep on
    /// the condition variable and the broadcast wakes it for a re-check.
    /// Broadcast rather than single notify: genuine waiters may share this
    /// condition variable and must not have their wakeup stolen.
    fn cancel(&self) {
        let latch = self
            .event
            .latch()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.canceled.store(true, Ordering::SeqCst);
        self.event.condvar().notify_all();
        drop(latch);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// A proxy as the coordinator sees it.
struct Proxy {
    shared: Arc<ProxyShared>,
    /// `None` once the thread has been joined.
    handle: Option<thread::JoinHandle<ProxyStatus>>,
}

impl Proxy {
    /// Joins a proxy that has published its completion bit.
    fn join_done(&mut self) -> Result<(), Error> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(ProxyStatus::Signaled) => Ok(()),
            // A proxy reports `Canceled` only after being asked to, which
            // has not happened on this path; anything but an observed signal
            // means the primitives underneath the proxy failed.
            Ok(ProxyStatus::Canceled | ProxyStatus::Poisoned) | Err(_) => Err(Error::Poisoned),
        }
    }
}

/// Body of a proxy thread: wait, then publish completion no matter what.
fn proxy_main(shared: &ProxyShared) -> ProxyStatus {
    let status = wait_for_signal(shared);
    let mut done = shared.rendezvous.lock_done();
    done[shared.index] = true;
    shared.rendezvous.cvar.notify_one();
    drop(done);
    status
}

/// Blocks on the target event until it is signaled or the proxy is
/// canceled.
///
/// The proxy never consumes the signal, not even for auto-reset events;
/// consumption belongs to the coordinator so that `wait_all` can consume a
/// whole group atomically. The cancellation flag is checked before the
/// first sleep as well, for a proxy that is canceled before it ever gets to
/// wait.
fn wait_for_signal(shared: &ProxyShared) -> ProxyStatus {
    let Ok(mut latch) = shared.event.latch().lock() else {
        return ProxyStatus::Poisoned;
    };
    loop {
        if shared.is_canceled() {
            return ProxyStatus::Canceled;
        }
        if *latch {
            return ProxyStatus::Signaled;
        }
        latch = match shared.event.condvar().wait(latch) {
            Ok(guard) => guard,
            Err(_) => return ProxyStatus::Poisoned,
        };
    }
}

/// Spawns one proxy per event, clearing the completion bits first.
///
/// If a spawn fails, the proxies that did start are canceled and joined
/// before the error is returned, so no helper thread outlives the call.
fn spawn_proxies(events: &[Event], rendezvous: &Arc<Rendezvous>) -> Result<Vec<Proxy>, Error> {
    rendezvous.lock_done().fill(false);

    let mut proxies: Vec<Proxy> = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        let shared = Arc::new(ProxyShared {
            event: event.clone(),
            rendezvous: Arc::clone(rendezvous),
            index,
            canceled: AtomicBool::new(false),
        });
        let for_thread = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("event-proxy-{index}"))
            .spawn(move || proxy_main(&for_thread));
        match spawned {
            Ok(handle) => proxies.push(Proxy {
                shared,
                handle: Some(handle),
            }),
            Err(e) => {
                debug!("failed to spawn proxy waiter {index}: {e}");
                for proxy in &proxies {
                    proxy.shared.cancel();
                }
                for proxy in &mut proxies {
                    if let Some(handle) = proxy.handle.take() {
                        let _ = handle.join();
                    }
                }
                return Err(Error::Spawn(e));
            }
        }
    }
    Ok(proxies)
}

/// Consumes the signal of an auto-reset event on behalf of the winning
/// `wait_any` caller. Clears the latch unconditionally, as the single-event
/// wait would have.
fn consume_signal(event: &Event) {
    if event.is_auto_reset() {
        let mut latch = event
            .latch()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *latch = false;
    }
}

/// The `wait_all` group step: confirms that every event is still signaled,
/// under all of their locks at once, and consumes the auto-reset ones as a
/// group.
///
/// Event mutexes are acquired in input order, so concurrent `wait_all`
/// callers over the same events cannot acquire them in conflicting orders.
/// The check is needed because proxies report readiness without keeping
/// their event locked: a competing waiter may have consumed an auto-reset
/// event between the proxy's report and this step.
fn verify_and_consume(events: &[Event]) -> Result<Outcome, Error> {
    let mut guards: Vec<MutexGuard<'_, bool>> = Vec::with_capacity(events.len());
    for event in events {
        let Ok(guard) = event.latch().lock() else {
            return Err(Error::Poisoned);
        };
        if !*guard {
            // Somebody consumed this event after our proxy reported it;
            // give up the locks taken so far and start the wait over.
            return Ok(Outcome::Restart);
        }
        guards.push(guard);
    }

    for (event, guard) in events.iter().zip(guards.iter_mut()) {
        if event.is_auto_reset() {
            **guard = false;
        }
    }
    // release in reverse acquisition order
    while let Some(guard) = guards.pop() {
        drop(guard);
    }
    Ok(Outcome::Win(0))
}

/// The coordinator for composite waits over two or more events.
///
/// One iteration of the outer loop is one "round": spawn the proxies, sleep
/// on the rendezvous until the any/all condition is met, tear the proxies
/// down. Only a lost `wait_all` verification race starts a second round.
fn coordinate(events: &[Event], wait_all: bool, deadline: Option<Instant>) -> Result<usize, Error> {
    let rendezvous = Arc::new(Rendezvous::new(events.len()));

    loop {
        let mut proxies = spawn_proxies(events, &rendezvous)?;
        let mut done = rendezvous.lock_done();

        let verdict: Result<Outcome, Error> = 'round: loop {
            if wait_all {
                let mut all_done = true;
                for (index, proxy) in proxies.iter_mut().enumerate() {
                    if done[index] {
                        if let Err(error) = proxy.join_done() {
                            break 'round Err(error);
                        }
                    } else {
                        all_done = false;
                    }
                }
                if all_done {
                    break 'round verify_and_consume(events);
                }
            } else {
                let mut winner = None;
                for (index, proxy) in proxies.iter_mut().enumerate() {
                    if done[index] {
                        if let Err(error) = proxy.join_done() {
                            break 'round Err(error);
                        }
                        winner = Some(index);
                        break;
                    }
                }
                if let Some(index) = winner {
                    consume_signal(&events[index]);
                    break 'round Ok(Outcome::Win(index));
                }
            }

            match deadline {
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        trace!("composite wait timed out before any completion");
                        break 'round Err(Error::Timeout);
                    }
                    let (guard, result) = rendezvous
                        .cvar
                        .wait_timeout(done, at - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    done = guard;
                    if result.timed_out() {
                        break 'round Err(Error::Timeout);
                    }
                }
                None => {
                    done = rendezvous
                        .cvar
                        .wait(done)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        };

        // Teardown runs on every exit from the round, success included: any
        // proxy that has not reported is canceled and woken, then all of
        // them are joined with the rendezvous lock released.
        for (index, proxy) in proxies.iter().enumerate() {
            if !done[index] {
                trace!("canceling proxy waiter {index}");
                proxy.shared.cancel();
            }
        }
        drop(done);
        for proxy in &mut proxies {
            if let Some(handle) = proxy.handle.take() {
                // unwinding; the proxy's own status no longer matters
                let _ = handle.join();
            }
        }

        match verdict? {
            Outcome::Win(index) => return Ok(index),
            Outcome::Restart => {
                debug!("group verification lost a race to a competing waiter; restarting");
            }
        }
    }
}
