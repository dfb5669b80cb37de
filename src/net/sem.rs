// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-shared semaphores embedded in the shared regions.
//!
//! Every synchronization point of the net protocol is one of these. They
//! live inside the `#[repr(C)]` shared structs, are initialized exactly once
//! by the net founder with `pshared = 1`, and are destroyed by the last
//! departing peer. `nix` does not wrap unnamed process-shared semaphores, so
//! this is a thin shim over `libc::sem_t`.

use std::cell::UnsafeCell;
use std::time::Duration;

use nix::errno::Errno;

use crate::error::{Error, Result};

/// An unnamed POSIX semaphore shared between processes.
///
/// Safety model: the wrapper itself is always reachable through a mapped
/// shared region (or test-local memory). [`Semaphore::init`] must have run
/// exactly once, before any other operation, and [`Semaphore::destroy`] only
/// after every peer is done with it; both are therefore `unsafe`.
#[repr(C)]
pub struct Semaphore(UnsafeCell<libc::sem_t>);

// Waits and posts from several threads and processes are the whole point.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Initializes the semaphore with `value` tokens, shared across
    /// processes.
    ///
    /// # Safety
    ///
    /// Only the net founder may call this, once, before the region is
    /// published to any other peer.
    pub unsafe fn init(&self, value: u32) -> Result<()> {
        if unsafe { libc::sem_init(self.0.get(), 1, value) } == 0 {
            Ok(())
        } else {
            Err(Error::SemaphoreInit(Errno::last()))
        }
    }

    /// Takes one token, blocking until one is available.
    ///
    /// Signal interruptions are retried: the handlers only flip atomic
    /// flags, and the protocol decides what to do with them at its own
    /// suspension points.
    pub fn wait(&self) -> Result<()> {
        loop {
            if unsafe { libc::sem_wait(self.0.get()) } == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(Error::Semaphore(errno)),
            }
        }
    }

    /// Takes one token if one is immediately available.
    pub fn try_wait(&self) -> Result<bool> {
        if unsafe { libc::sem_trywait(self.0.get()) } == 0 {
            return Ok(true);
        }
        match Errno::last() {
            Errno::EAGAIN => Ok(false),
            errno => Err(Error::Semaphore(errno)),
        }
    }

    /// Takes one token, giving up after `patience`.
    ///
    /// Returns `Ok(false)` on timeout. Used for the `round` and `result`
    /// waits so a dead peer cannot wedge the net forever.
    pub fn timed_wait(&self, patience: Duration) -> Result<bool> {
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut deadline) } != 0 {
            return Err(Error::Semaphore(Errno::last()));
        }
        deadline.tv_sec += patience.as_secs() as libc::time_t;
        deadline.tv_nsec += patience.subsec_nanos() as libc::c_long;
        if deadline.tv_nsec >= 1_000_000_000 {
            deadline.tv_sec += 1;
            deadline.tv_nsec -= 1_000_000_000;
        }

        loop {
            if unsafe { libc::sem_timedwait(self.0.get(), &deadline) } == 0 {
                return Ok(true);
            }
            match Errno::last() {
                // The deadline is absolute, so retrying keeps the patience.
                Errno::EINTR => continue,
                Errno::ETIMEDOUT => return Ok(false),
                errno => return Err(Error::Semaphore(errno)),
            }
        }
    }

    /// Returns one token.
    pub fn post(&self) -> Result<()> {
        if unsafe { libc::sem_post(self.0.get()) } == 0 {
            Ok(())
        } else {
            Err(Error::Semaphore(Errno::last()))
        }
    }

    /// Destroys the semaphore.
    ///
    /// # Safety
    ///
    /// Only the last departing peer may call this, and no peer may touch the
    /// semaphore afterwards.
    pub unsafe fn destroy(&self) {
        unsafe { libc::sem_destroy(self.0.get()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(value: u32) -> Semaphore {
        // Stack-local sem_t works the same as a mapped one in one process.
        let sem: Semaphore = unsafe { std::mem::zeroed() };
        unsafe { sem.init(value) }.unwrap();
        sem
    }

    #[test]
    fn post_then_wait() {
        let sem = fresh(0);
        sem.post().unwrap();
        sem.wait().unwrap();
        unsafe { sem.destroy() };
    }

    #[test]
    fn try_wait_reports_empty() {
        let sem = fresh(1);
        assert!(sem.try_wait().unwrap());
        assert!(!sem.try_wait().unwrap());
        unsafe { sem.destroy() };
    }

    #[test]
    fn timed_wait_times_out() {
        let sem = fresh(0);
        let took = std::time::Instant::now();
        assert!(!sem.timed_wait(Duration::from_millis(50)).unwrap());
        assert!(took.elapsed() >= Duration::from_millis(30));
        unsafe { sem.destroy() };
    }

    #[test]
    fn timed_wait_sees_cross_thread_post() {
        let sem = std::sync::Arc::new(fresh(0));
        let poster = std::sync::Arc::clone(&sem);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            poster.post().unwrap();
        });
        assert!(sem.timed_wait(Duration::from_secs(2)).unwrap());
        handle.join().unwrap();
        unsafe { sem.destroy() };
    }
}
