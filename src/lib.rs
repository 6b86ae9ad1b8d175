// only enables the `doc_cfg` feature when the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![forbid(unsafe_code)]

//! Event objects for synchronizing threads, in the style of the `Win32`
//! event, built on [`Mutex`](std::sync::Mutex) and
//! [`Condvar`](std::sync::Condvar).
//!
//! An [`Event`] is a binary latch that producer threads [`signal`](Event::signal)
//! and consumer threads [`wait`](Event::wait) on. An *auto-reset* event hands
//! its signal to exactly one waiter and falls back to unsignaled; a
//! *manual-reset* event releases all current and future waiters until it is
//! explicitly [`reset`](Event::reset).
//!
//! [`wait_any`] and [`wait_all`] block on several events at once, which a
//! single condition variable cannot do, and tear down their helper threads
//! on every exit path.
//!
//! ## Example: wake up as soon as the first worker finishes
//!
//! ```rust
//! use event_sync::{wait_any, Event, ResetPolicy};
//! use std::thread;
//!
//! // one auto-reset event per worker, signaled when its result is ready:
//! let ready: Vec<Event> = (0..3)
//!     .map(|_| Event::new(ResetPolicy::Auto, false))
//!     .collect();
//!
//! for (i, event) in ready.iter().enumerate() {
//!     let event = event.clone();
//!     thread::spawn(move || {
//!         // ... produce result i ...
//!         event.signal().unwrap();
//!     });
//! }
//!
//! // [main thread] block here until any one of the workers is done:
//! let first = wait_any(&ready, None).unwrap();
//! println!("worker {first} finished first");
//! ```

mod event;
mod multi;

pub use event::{Event, ResetPolicy};
pub use multi::{wait_all, wait_any};

use std::sync::PoisonError;
use thiserror::Error as ThisError;

/// The ways in which an event operation can fail.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The deadline elapsed before the wait was satisfied.
    #[error("the wait timed out")]
    Timeout,

    /// A mutex involved in the operation was poisoned by a panicking thread.
    ///
    /// For [`wait_any`] and [`wait_all`] this also covers failures inside the
    /// helper threads; which of them failed is not recorded.
    #[error("a synchronization primitive was poisoned")]
    Poisoned,

    /// A helper thread for a multi-event wait could not be spawned.
    #[error("failed to spawn a waiter thread")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    /// Convenience method to check the concrete failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(&self, Self::Timeout)
    }
    /// Convenience method to check the concrete failure.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        matches!(&self, Self::Poisoned)
    }
    /// Convenience method to check the concrete failure.
    #[must_use]
    pub fn is_spawn(&self) -> bool {
        matches!(&self, Self::Spawn(_))
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_e: PoisonError<T>) -> Error {
        Error::Poisoned
    }
}
