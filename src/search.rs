// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parallel preimage search.
//!
//! One round of mining inverts [`puzzle::hash`] by brute force: the domain
//! `[0, PRIME)` is split into near-equal contiguous ranges, one worker
//! thread per range, and every worker polls two flags on each step: the
//! internal "someone found it" flag and the external signal-driven
//! interrupt. The map is a bijection, so a full undisturbed scan always
//! finds exactly one preimage; `None` can only come out of a cancelled
//! round.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Error, Result};
use crate::puzzle::{self, PRIME};

/// Most workers a peer may run.
pub const MAX_WORKERS: usize = 10;

/// Scans the whole domain for a preimage of `target` with `n_workers`
/// threads.
///
/// Returns `Ok(None)` iff the search was interrupted before any worker hit
/// the preimage.
///
/// # Errors
///
/// - [`Error::WorkerStart`] if a worker thread could not be spawned; the
///   already-running workers are stopped and joined first.
/// - [`Error::WorkerJoin`] if a worker panicked.
pub fn search(target: u64, n_workers: usize, interrupt: &AtomicBool) -> Result<Option<u64>> {
    debug_assert!((1..=MAX_WORKERS).contains(&n_workers));

    let found = AtomicBool::new(false);
    let mut solution = None;
    let mut failure = None;

    thread::scope(|scope| {
        let mut workers = Vec::with_capacity(n_workers);
        for index in 0..n_workers {
            let range = worker_range(index, n_workers);
            let found = &found;
            let spawned = thread::Builder::new()
                .name(format!("searcher-{index}"))
                .spawn_scoped(scope, move || scan(target, range, interrupt, found));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    // Stop the workers already running; they get joined below.
                    found.store(true, Ordering::Relaxed);
                    failure = Some(Error::WorkerStart(source));
                    break;
                }
            }
        }
        for handle in workers {
            match handle.join() {
                Ok(Some(preimage)) => solution = Some(preimage),
                Ok(None) => {}
                Err(_) => {
                    found.store(true, Ordering::Relaxed);
                    failure = Some(Error::WorkerJoin);
                }
            }
        }
    });

    match failure {
        Some(error) => Err(error),
        None => Ok(solution),
    }
}

/// The `index`-th of `of` contiguous ranges covering `[0, PRIME)` exactly.
fn worker_range(index: usize, of: usize) -> Range<u64> {
    let start = (u128::from(PRIME) * index as u128 / of as u128) as u64;
    let end = (u128::from(PRIME) * (index as u128 + 1) / of as u128) as u64;
    start..end
}

fn scan(target: u64, range: Range<u64>, interrupt: &AtomicBool, found: &AtomicBool) -> Option<u64> {
    for x in range {
        if found.load(Ordering::Relaxed) || interrupt.load(Ordering::Relaxed) {
            return None;
        }
        if puzzle::hash(x) == target {
            found.store(true, Ordering::Relaxed);
            return Some(x);
        }
    }
    None
}
