// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! The per-peer local blockchain.
//!
//! Every committed round, each peer snapshots the shared block into a
//! [`BlockRecord`] and appends it here. The chain is append-only and only
//! ever walked backward (newest first) for printing, so it is a plain
//! arena in commit order rather than a pointer graph; an index into the
//! arena is a back-link.

use std::fmt;

use crate::net::{MAX_MINERS, SharedBlock, WALLET_VACANT};

/// A committed block as this peer saw it at commit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    pub id: u32,
    pub target: u64,
    pub solution: u64,
    wallets: [i32; MAX_MINERS],
}

impl BlockRecord {
    /// Snapshots a shared block, or nothing if no solution is proposed
    /// (only committed blocks carry one).
    pub fn snapshot(block: &SharedBlock) -> Option<Self> {
        Some(Self {
            id: block.id,
            target: block.target,
            solution: block.solution()?,
            wallets: block.wallets,
        })
    }

    /// The occupied wallet entries at commit time, in slot order.
    pub fn wallets(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.wallets
            .iter()
            .enumerate()
            .filter(|(_, credit)| **credit != WALLET_VACANT)
            .map(|(slot, credit)| (slot, *credit))
    }
}

impl fmt::Display for BlockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {}: target {}, solution {}",
            self.id, self.target, self.solution
        )?;
        for (slot, credit) in self.wallets() {
            write!(f, "\n  wallet {slot}: {credit}")?;
        }
        Ok(())
    }
}

/// This peer's history of committed blocks, oldest first.
#[derive(Default)]
pub struct Chain {
    records: Vec<BlockRecord>,
}

impl Chain {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Appends the next committed block.
    pub fn append(&mut self, record: BlockRecord) {
        self.records.push(record);
    }

    /// Number of committed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recently committed block.
    #[must_use]
    pub fn tip(&self) -> Option<&BlockRecord> {
        self.records.last()
    }

    /// Walks the chain newest first.
    pub fn iter_back(&self) -> impl Iterator<Item = &BlockRecord> {
        self.records.iter().rev()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in self.iter_back() {
            writeln!(f, "{record}")?;
        }
        write!(f, "{} blocks in total", self.len())
    }
}
