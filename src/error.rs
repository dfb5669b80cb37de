// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared across the crate.

use std::io;

use thiserror::Error;

/// Errors a miner peer may hit between startup and teardown.
#[derive(Debug, Error)]
pub enum Error {
    #[error("miner net is full ({0} seats taken)")]
    CapacityExceeded(usize),
    #[error("shared region {name} could not be set up")]
    SharedRegion {
        name: String,
        #[source]
        source: nix::Error,
    },
    #[error("semaphore initialization failed")]
    SemaphoreInit(#[source] nix::Error),
    #[error("semaphore operation failed")]
    Semaphore(#[source] nix::Error),
    #[error("could not start search worker")]
    WorkerStart(#[source] io::Error),
    #[error("search worker did not end correctly")]
    WorkerJoin,
    #[error("gave up waiting for the net after {0:?}")]
    Timeout(std::time::Duration),
    #[error("could not signal peer {pid}")]
    PeerSignal {
        pid: i32,
        #[source]
        source: nix::Error,
    },
}

impl Error {
    /// A timed-out wait means the net went quiet, not that this peer broke.
    /// The main loop exits cleanly on it instead of reporting a failure.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
