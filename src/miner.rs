// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! The per-peer round protocol.
//!
//! A [`Miner`] drives one peer through successive rounds: wait for a round
//! ticket, search for a preimage, claim the win or judge the claimed
//! candidate, tally or cast a ballot, commit or reject, barrier into the
//! next round. The shared-state choreography lives in [`crate::net`]; this
//! module owns the ordering.
//!
//! One round, from this peer's point of view:
//! - take a `round` ticket (timed, since a quiet net means "leave,
//!   cleanly"), snapshot the target, run the parallel search;
//! - with the `winner` gate held, either claim the round (first claimer
//!   wins) or vote on whatever candidate is published;
//! - the winner closes `entry`, fixes the electorate `N`, publishes its
//!   solution, cancels the other searches, collects `N−1` ballots, decides,
//!   and releases the voters with `N−1` `result` posts;
//! - everyone appends the block locally iff it committed; the winner holds
//!   the `updated` barrier until all electors confirmed, then resets the
//!   round state and reopens `entry`.
//!
//! Departures happen only at round boundaries: a peer always discharges its
//! ballot and its barrier post for the round in progress before leaving, so
//! the electorate snapshot a winner takes always matches the posts it
//! collects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::chain::{BlockRecord, Chain};
use crate::error::{Error, Result};
use crate::net::{NetHandle, SOLUTION_ABSENT};
use crate::puzzle;
use crate::search;
use crate::signals;

/// How long a peer waits on the net before concluding it is dead.
pub const PATIENCE: Duration = Duration::from_secs(3);

/// Static per-peer parameters.
#[derive(Clone, Copy, Debug)]
pub struct MinerConfig {
    /// Parallel search workers, in `[1, MAX_WORKERS]`.
    pub workers: usize,
    /// Committed rounds to mine before leaving; zero or negative means
    /// mine until interrupted.
    pub rounds: i64,
}

/// How a round ended for this peer.
struct RoundEnd {
    committed: bool,
    won: bool,
    departing: bool,
}

/// Protocol tokens this peer is holding or owing mid-round.
///
/// The `winner` and `entry` gates and the winner's `voting` barrier are
/// plain blocking waits, so a peer that dies while holding a gate, or
/// before casting its ballot, would wedge every survivor. The round loop
/// keeps this record current; the fatal-error path releases whatever is
/// still marked here before tearing down. The timed waits (`round`,
/// `result`) never run while any of these is set.
#[derive(Default)]
struct HeldTokens {
    /// The `winner` gate is held.
    winner: bool,
    /// The `entry` gate is held (winner only).
    entry: bool,
    /// A `voting` post is owed to this round's winner.
    ballot_due: bool,
}

/// What this peer turned out to be for one round.
enum Role {
    Winner { electorate: usize },
    Voter,
}

/// One mining peer: its net handle, its local chain, its parameters, and
/// the two cancellation flags the signal handlers feed.
pub struct Miner {
    net: NetHandle,
    chain: Chain,
    config: MinerConfig,
    held: HeldTokens,
    /// Stops the round's search; raised by `SIGUSR2`/`SIGINT`, rearmed
    /// every round.
    search_interrupt: &'static AtomicBool,
    /// Makes this the peer's last round; raised by `SIGINT`, never rearmed.
    shutdown: &'static AtomicBool,
}

impl Miner {
    /// Registers with the net (founding it if absent) and prepares an empty
    /// local chain. Cancellation is wired to the process signal flags.
    pub fn register(config: MinerConfig) -> Result<Self> {
        let net = NetHandle::register()?;
        Ok(Self {
            net,
            chain: Chain::new(),
            config,
            held: HeldTokens::default(),
            search_interrupt: signals::search_interrupt(),
            shutdown: signals::shutdown_flag(),
        })
    }

    #[cfg(test)]
    pub(crate) fn register_named(
        config: MinerConfig,
        net_name: String,
        block_name: String,
    ) -> Result<Self> {
        let net = NetHandle::register_named(net_name, block_name)?;
        Ok(Self {
            net,
            chain: Chain::new(),
            config,
            held: HeldTokens::default(),
            search_interrupt: Box::leak(Box::new(AtomicBool::new(false))),
            shutdown: Box::leak(Box::new(AtomicBool::new(false))),
        })
    }

    /// Mines rounds until the budget is spent or the operator interrupts,
    /// then departs and hands back the local chain.
    ///
    /// A patience timeout on the net is a clean exit, not an error; every
    /// real failure tears the peer down before propagating.
    pub fn run(mut self) -> Result<Chain> {
        if self.shutdown.load(Ordering::Relaxed) {
            // Interrupted before the first round: take back the unused
            // round ticket so it cannot release anyone else early.
            let _ = self.net.sems().round.try_wait();
            return self.finish(false);
        }

        let mut committed_rounds: i64 = 0;
        loop {
            let budget_last =
                self.config.rounds > 0 && committed_rounds + 1 >= self.config.rounds;
            match self.run_round(budget_last) {
                Ok(end) => {
                    committed_rounds += i64::from(end.committed);
                    if end.departing {
                        return self.finish(end.won);
                    }
                }
                Err(error) if error.is_timeout() => {
                    info!("{error}, leaving the net");
                    return self.finish(false);
                }
                Err(error) => {
                    warn!("fatal error mid-round, tearing down");
                    // Reopen any gate this peer still holds before leaving;
                    // `winner`/`entry`/`voting` waits are not timed, and a
                    // gate taken into the grave wedges every survivor.
                    self.release_held();
                    let _ = self.net.depart(false);
                    return Err(error);
                }
            }
        }
    }

    /// Departs and returns the local chain.
    fn finish(self, final_round_winner: bool) -> Result<Chain> {
        let Self { net, chain, .. } = self;
        net.depart(final_round_winner)?;
        Ok(chain)
    }

    /// Releases every gate still held and discharges a pending ballot.
    ///
    /// Best effort, for the fatal-error exit only: the `updated` obligation
    /// is covered by [`NetHandle::depart`] afterwards. A discharged ticket
    /// without a ballot behind it may let the round's winner tally early;
    /// the pool reset at the next transition bounds that drift.
    fn release_held(&mut self) {
        let sems = self.net.sems();
        if self.held.ballot_due {
            let _ = sems.voting.post();
        }
        if self.held.winner {
            let _ = sems.winner.post();
        }
        if self.held.entry {
            let _ = sems.entry.post();
        }
        self.held = HeldTokens::default();
    }

    /// Runs one full round. `budget_last` says a commit this round spends
    /// the round budget.
    fn run_round(&mut self, budget_last: bool) -> Result<RoundEnd> {
        let net = &self.net;
        let sems = net.sems();

        // Idle: wait for the round ticket, then arm a fresh search.
        if !sems.round.timed_wait(PATIENCE)? {
            return Err(Error::Timeout(PATIENCE));
        }
        // Seated elector from here on: a winner may count this peer into
        // its barriers, so a ballot is owed until cast or until this peer
        // claims the round itself.
        self.held.ballot_due = true;
        self.search_interrupt.store(false, Ordering::Relaxed);
        let target = net.with_block(|block| block.target)?;

        // Searching.
        info!(
            "searching a preimage of {target} with {} workers",
            self.config.workers
        );
        let found = search::search(target, self.config.workers, self.search_interrupt)?;

        // Claiming, then voting, both serialized through the winner gate.
        sems.winner.wait()?;
        self.held.winner = true;
        let claim = match found {
            Some(preimage) => net.try_claim_winner()?.then_some(preimage),
            None => None,
        };
        let role = match claim {
            Some(preimage) => {
                // The winner tallies, it does not vote.
                self.held.ballot_due = false;
                // Winner: no more joins this round, electorate is fixed now.
                sems.entry.wait()?;
                self.held.entry = true;
                let electorate = net.electorate()?;
                net.with_block(|block| block.solution = preimage as i64)?;
                let cancelled = net.cancel_other_searches()?;
                info!(
                    "claimed the round with preimage {preimage}, \
                     cancelled {cancelled} other searches"
                );
                sems.winner.post()?;
                self.held.winner = false;
                Role::Winner { electorate }
            }
            None => {
                if found.is_some() {
                    debug!("found a preimage too late, voting instead");
                }
                // Judge whatever candidate is published right now. An
                // interrupted round may not have one; that is a no ballot.
                let (candidate, current_target) =
                    net.with_block(|block| (block.solution(), block.target))?;
                let approve = candidate.is_some_and(|s| puzzle::hash(s) == current_target);
                net.cast_ballot(approve)?;
                sems.voting.post()?;
                self.held.ballot_due = false;
                sems.winner.post()?;
                self.held.winner = false;
                debug!("voted {}", if approve { "yes" } else { "no" });
                Role::Voter
            }
        };

        match role {
            Role::Winner { electorate } => self.close_round_as_winner(electorate, budget_last),
            Role::Voter => self.close_round_as_voter(budget_last),
        }
    }

    /// Winner side of the round end: tally, verdict, reward, barriers,
    /// round transition.
    fn close_round_as_winner(&mut self, electorate: usize, budget_last: bool) -> Result<RoundEnd> {
        let net = &self.net;
        let sems = net.sems();

        // One ballot from every other elector.
        for _ in 1..electorate {
            sems.voting.wait()?;
        }
        let tally = net.tally()?;
        let committed = tally.commits();
        if committed {
            net.with_block(|block| {
                block.is_valid = 1;
                block.wallets[net.slot()] += 1;
            })?;
            info!(
                "solution accepted ({} yes / {} no), block committed",
                tally.yes, tally.no
            );
        } else {
            info!(
                "solution rejected ({} yes / {} no), block dropped",
                tally.yes, tally.no
            );
        }
        // Append before releasing the voters: once `result` is posted a
        // departing voter may start vacating its wallet, and this snapshot
        // must still show the electorate that committed.
        if committed {
            let snapshot = net.with_block(|block| *block)?;
            if let Some(record) = BlockRecord::snapshot(&snapshot) {
                debug!("chain extended to block {}", record.id);
                self.chain.append(record);
            }
        }
        for _ in 1..electorate {
            sems.result.post()?;
        }

        // Every other elector confirms its append (or the rejection).
        for _ in 1..electorate {
            sems.updated.wait()?;
        }

        let departing = (budget_last && committed) || self.shutdown.load(Ordering::Relaxed);

        // Round transition: block fields first, then the registry. The two
        // content mutexes are taken in sequence, never nested.
        net.with_block(|block| {
            if committed {
                if let Some(solution) = block.solution() {
                    block.target = solution;
                }
                block.id += 1;
                block.is_valid = 0;
            }
            block.solution = SOLUTION_ABSENT;
        })?;
        let next_electorate = net.reset_for_next_round(committed)?;

        // Release the electors. A departing winner keeps its own ticket
        // back, so no stray ticket outlives it.
        let tickets = next_electorate - usize::from(departing);
        for _ in 0..tickets {
            sems.round.post()?;
        }
        sems.entry.post()?;
        self.held.entry = false;

        Ok(RoundEnd {
            committed,
            won: true,
            departing,
        })
    }

    /// Voter side of the round end: learn the verdict, append on commit,
    /// confirm through the update barrier.
    fn close_round_as_voter(&mut self, budget_last: bool) -> Result<RoundEnd> {
        let net = &self.net;
        let sems = net.sems();

        if !sems.result.timed_wait(PATIENCE)? {
            return Err(Error::Timeout(PATIENCE));
        }

        let snapshot = net.with_block(|block| *block)?;
        let committed = snapshot.is_valid();
        if committed {
            if let Some(record) = BlockRecord::snapshot(&snapshot) {
                info!("chain extended to block {}", record.id);
                self.chain.append(record);
            }
        } else {
            debug!("round ended without a new block");
        }

        let departing = (budget_last && committed) || self.shutdown.load(Ordering::Relaxed);
        if !departing {
            sems.updated.post()?;
        }
        // A departing voter defers this post into its teardown, after its
        // seat is vacated, so the winner's re-read of the electorate
        // excludes it from the next round.

        Ok(RoundEnd {
            committed,
            won: false,
            departing,
        })
    }
}
