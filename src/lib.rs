// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Peer-to-peer proof-of-work mining simulator.
//!
//! Every `miner` process is one peer in a shared *net* living in two POSIX
//! shared-memory regions on the local host. Peers race through rounds:
//! search the puzzle domain in parallel, claim the win, vote on the
//! claimed solution, commit or reject the block, and barrier into the next
//! round. The last peer to leave reclaims the shared regions.
//!
//! The main components:
//! - [`puzzle`] is the affine-map primitive the rounds invert.
//! - [`search`] splits the domain over worker threads with cooperative
//!   cancellation.
//! - [`net`] owns the shared regions, the semaphore family, admission and
//!   teardown.
//! - [`miner`] drives the round protocol for one peer.
//! - [`chain`] is the peer-local history of committed blocks.
//! - [`signals`] turns `SIGINT`/`SIGUSR2` into cancellation flags.

pub mod chain;
pub mod error;
pub mod miner;
pub mod net;
pub mod puzzle;
pub mod search;
pub mod signals;

pub use chain::{BlockRecord, Chain};
pub use error::Error;
pub use miner::{Miner, MinerConfig};
pub use net::NetHandle;
