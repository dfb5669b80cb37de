// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! The shared miner net.
//!
//! All cross-peer state lives in two named shared-memory regions mapped
//! identically into every peer:
//! - [`NetData`] (`/netdata`) holds the peer slot table, the voting pool,
//!   the winner markers and the semaphore family driving the round
//!   protocol.
//! - [`SharedBlock`] (`/block`) holds the one live block every peer is
//!   mining on.
//!
//! A [`NetHandle`] owns both mappings for one peer. Founding and joining
//! are decided solely by the exclusive-create race on `/netdata`: the
//! winner initializes everything, everyone else opens and seats itself. The
//! handle's [`NetHandle::depart`] implements the orderly exit, including
//! the last-peer reclamation of both regions and all semaphores.
//!
//! Locking discipline: `net_mutex` guards the scalar fields and tables of
//! [`NetData`], `block_mutex` guards [`SharedBlock`]. The remaining
//! semaphores are protocol gates and barriers, not data guards, and the two
//! content mutexes are never nested.

mod sem;
mod shm;

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, getpid};

use crate::error::{Error, Result};
use crate::puzzle;

pub use sem::Semaphore;
pub use shm::SharedRegion;

/// Capacity of the peer slot table.
pub const MAX_MINERS: usize = 200;
/// Name of the net registry region.
pub const NET_SHM_NAME: &str = "/netdata";
/// Name of the current-block region.
pub const BLOCK_SHM_NAME: &str = "/block";

/// Slot-table sentinel for "no peer here".
pub const NO_PEER: libc::pid_t = -1;
/// Wallet sentinel for a vacant seat.
pub const WALLET_VACANT: i32 = -1;
/// Block sentinel for "no solution proposed yet".
pub const SOLUTION_ABSENT: i64 = -1;

/// Voting-pool states. One byte per slot, reset to absent every round.
pub const VOTE_ABSENT: i8 = -1;
/// Ballot against the proposed solution.
pub const VOTE_NO: i8 = 0;
/// Ballot for the proposed solution.
pub const VOTE_YES: i8 = 1;

/// The semaphore family, embedded in [`NetData`].
///
/// Initial values: `round`, `winner` and `entry` start with one token,
/// everything else with zero; the two content mutexes get their first post
/// once the data they guard is initialized.
#[repr(C)]
pub struct NetSems {
    /// Guards the scalar fields and tables of [`NetData`].
    pub net_mutex: Semaphore,
    /// Guards [`SharedBlock`].
    pub block_mutex: Semaphore,
    /// Tickets to enter a round; `N` posts at round end release all electors.
    pub round: Semaphore,
    /// Serializes the winner claim and every voter's solution read.
    pub winner: Semaphore,
    /// Confirm barrier: non-winners post after their local append.
    pub updated: Semaphore,
    /// Closed from winner election to round end so joins cannot interleave.
    pub entry: Semaphore,
    /// One ticket per ballot cast.
    pub voting: Semaphore,
    /// Winner posts `N−1` after the tally to release the voters.
    pub result: Semaphore,
}

/// The shared net registry. One live instance per net, in `/netdata`.
#[repr(C)]
pub struct NetData {
    /// Slot table; a peer's index in here is its identity for the net's
    /// lifetime.
    pub miners_pid: [libc::pid_t; MAX_MINERS],
    /// Per-slot ballot for the round in progress.
    pub voting_pool: [i8; MAX_MINERS],
    /// Count of occupied slots.
    pub total_miners: i32,
    /// PID of this round's winner, or [`NO_PEER`].
    pub current_winner: libc::pid_t,
    /// PID of the previous round's winner, or [`NO_PEER`].
    pub last_winner: libc::pid_t,
    /// The semaphore family.
    pub sems: NetSems,
}

/// The one live block, in `/block`. Mutated only by the round winner and at
/// round transitions.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SharedBlock {
    /// Reward counter per seated peer; [`WALLET_VACANT`] elsewhere.
    pub wallets: [i32; MAX_MINERS],
    /// The value this round's workers are inverting.
    pub target: u64,
    /// The proposed preimage, or [`SOLUTION_ABSENT`].
    pub solution: i64,
    /// Monotonic block number, starting at 1.
    pub id: u32,
    /// Whether the round has committed this block.
    pub is_valid: u32,
}

impl SharedBlock {
    /// The proposed solution, if any.
    pub fn solution(&self) -> Option<u64> {
        u64::try_from(self.solution).ok()
    }

    /// Whether the current round has committed.
    pub const fn is_valid(&self) -> bool {
        self.is_valid != 0
    }

    /// The occupied wallet entries, in slot order.
    pub fn occupied_wallets(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.wallets
            .iter()
            .enumerate()
            .filter(|(_, credit)| **credit != WALLET_VACANT)
            .map(|(slot, credit)| (slot, *credit))
    }
}

/// Yes/no totals over a voting pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
}

impl Tally {
    /// Counts the cast ballots in `pool`; absent slots count for neither
    /// side.
    #[must_use]
    pub fn count(pool: &[i8]) -> Self {
        let yes = pool.iter().filter(|ballot| **ballot == VOTE_YES).count();
        let no = pool.iter().filter(|ballot| **ballot == VOTE_NO).count();
        Self { yes, no }
    }

    /// The decision rule: commit on a strict majority of cast ballots, or
    /// when nobody voted at all (the solo-peer round).
    #[must_use]
    pub const fn commits(&self) -> bool {
        self.yes > self.no || (self.yes == 0 && self.no == 0)
    }
}

/// First empty slot in a peer table.
fn first_free_slot(pids: &[libc::pid_t]) -> Option<usize> {
    pids.iter().position(|pid| *pid == NO_PEER)
}

struct RegionNames {
    net: String,
    block: String,
}

/// One peer's handle on the net: both mappings, the peer's seat, and every
/// operation the round protocol performs on shared state.
pub struct NetHandle {
    net: SharedRegion<NetData>,
    block: SharedRegion<SharedBlock>,
    names: RegionNames,
    slot: usize,
    pid: Pid,
}

impl NetHandle {
    /// Founds the net or joins the existing one, whichever the
    /// exclusive-create race decides.
    ///
    /// # Errors
    ///
    /// - [`Error::SharedRegion`] if a region cannot be created, opened or
    ///   mapped; nothing has been published in that case.
    /// - [`Error::SemaphoreInit`] (founder only); the partially created
    ///   region is unlinked again.
    /// - [`Error::CapacityExceeded`] (joiner only); the net is left
    ///   untouched.
    pub fn register() -> Result<Self> {
        Self::register_named(NET_SHM_NAME.to_owned(), BLOCK_SHM_NAME.to_owned())
    }

    /// [`NetHandle::register`] against explicitly named regions.
    pub(crate) fn register_named(net_name: String, block_name: String) -> Result<Self> {
        match SharedRegion::<NetData>::create(&net_name) {
            Ok(region) => Self::found(region, net_name, block_name),
            Err(Errno::EEXIST) => match SharedRegion::<NetData>::open(&net_name) {
                Ok(region) => Self::join(region, net_name, block_name),
                Err(source) => Err(Error::SharedRegion {
                    name: net_name,
                    source,
                }),
            },
            Err(source) => Err(Error::SharedRegion {
                name: net_name,
                source,
            }),
        }
    }

    /// Founder path: initialize semaphores, seat self in slot 0, publish
    /// the registry, then create and publish the first block.
    fn found(net: SharedRegion<NetData>, net_name: String, block_name: String) -> Result<Self> {
        let pid = getpid();
        let sems = unsafe { &(*net.as_ptr()).sems };

        let init = || -> Result<()> {
            unsafe {
                sems.net_mutex.init(0)?;
                sems.block_mutex.init(0)?;
                sems.round.init(1)?;
                sems.winner.init(1)?;
                sems.updated.init(0)?;
                sems.entry.init(1)?;
                sems.voting.init(0)?;
                sems.result.init(0)?;
            }
            Ok(())
        };
        if let Err(error) = init() {
            let _ = SharedRegion::<NetData>::unlink(&net_name);
            return Err(error);
        }

        unsafe {
            let data = &mut *net.as_ptr();
            data.miners_pid[0] = pid.as_raw();
            for seat in &mut data.miners_pid[1..] {
                *seat = NO_PEER;
            }
            data.voting_pool.fill(VOTE_ABSENT);
            data.total_miners = 1;
            data.current_winner = NO_PEER;
            data.last_winner = NO_PEER;
        }
        // Registry is consistent; joiners may take the net mutex from here.
        sems.net_mutex.post()?;

        let block = match SharedRegion::<SharedBlock>::create(&block_name) {
            Ok(block) => block,
            Err(source) => {
                let _ = SharedRegion::<NetData>::unlink(&net_name);
                return Err(Error::SharedRegion {
                    name: block_name,
                    source,
                });
            }
        };
        let first_target = puzzle::random_target();
        unsafe {
            let block = &mut *block.as_ptr();
            block.id = 1;
            block.is_valid = 0;
            block.target = first_target;
            block.solution = SOLUTION_ABSENT;
            block.wallets[0] = 0;
            for wallet in &mut block.wallets[1..] {
                *wallet = WALLET_VACANT;
            }
        }
        sems.block_mutex.post()?;

        info!("founded the net in slot 0, first target is {first_target}");
        Ok(Self {
            net,
            block,
            names: RegionNames {
                net: net_name,
                block: block_name,
            },
            slot: 0,
            pid,
        })
    }

    /// Joiner path: gated by `entry` so a join can never interleave with a
    /// round transition; seats self in the first free slot, publishes its
    /// wallet, and posts its own `round` ticket.
    fn join(net: SharedRegion<NetData>, net_name: String, block_name: String) -> Result<Self> {
        let pid = getpid();
        let sems = unsafe { &(*net.as_ptr()).sems };

        sems.entry.wait()?;

        sems.net_mutex.wait()?;
        let seat = unsafe {
            let data = &mut *net.as_ptr();
            match first_free_slot(&data.miners_pid) {
                Some(slot) => {
                    data.miners_pid[slot] = pid.as_raw();
                    data.total_miners += 1;
                    Some(slot)
                }
                None => None,
            }
        };
        sems.net_mutex.post()?;
        let Some(slot) = seat else {
            sems.entry.post()?;
            return Err(Error::CapacityExceeded(MAX_MINERS));
        };

        sems.block_mutex.wait()?;
        let block = match SharedRegion::<SharedBlock>::open(&block_name) {
            Ok(block) => block,
            Err(source) => {
                sems.block_mutex.post()?;
                // Give the seat back before surfacing the failure.
                sems.net_mutex.wait()?;
                unsafe {
                    let data = &mut *net.as_ptr();
                    data.miners_pid[slot] = NO_PEER;
                    data.total_miners -= 1;
                }
                sems.net_mutex.post()?;
                sems.entry.post()?;
                return Err(Error::SharedRegion {
                    name: block_name,
                    source,
                });
            }
        };
        unsafe {
            (*block.as_ptr()).wallets[slot] = 0;
        }
        sems.block_mutex.post()?;

        // The ticket this peer will consume to enter its first round.
        sems.round.post()?;
        sems.entry.post()?;

        info!("joined the net in slot {slot}");
        Ok(Self {
            net,
            block,
            names: RegionNames {
                net: net_name,
                block: block_name,
            },
            slot,
            pid,
        })
    }

    /// This peer's seat in the slot table.
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// The semaphore family.
    pub fn sems(&self) -> &NetSems {
        unsafe { &(*self.net.as_ptr()).sems }
    }

    /// Runs `f` on the registry under the net mutex.
    ///
    /// `f` must not touch [`NetData::sems`]; the semaphores are not data.
    pub fn with_net<R>(&self, f: impl FnOnce(&mut NetData) -> R) -> Result<R> {
        self.sems().net_mutex.wait()?;
        let result = f(unsafe { &mut *self.net.as_ptr() });
        self.sems().net_mutex.post()?;
        Ok(result)
    }

    /// Runs `f` on the shared block under the block mutex.
    pub fn with_block<R>(&self, f: impl FnOnce(&mut SharedBlock) -> R) -> Result<R> {
        self.sems().block_mutex.wait()?;
        let result = f(unsafe { &mut *self.block.as_ptr() });
        self.sems().block_mutex.post()?;
        Ok(result)
    }

    /// Attempts to become this round's winner.
    ///
    /// Caller must hold the `winner` gate. First claimer wins; everyone
    /// later sees an occupied marker and downgrades to voter.
    pub fn try_claim_winner(&self) -> Result<bool> {
        self.with_net(|data| {
            if data.current_winner == NO_PEER {
                data.current_winner = self.pid.as_raw();
                true
            } else {
                false
            }
        })
    }

    /// Sends the search-cancellation signal to every other seated peer.
    ///
    /// Returns how many peers were signalled. A stale slot whose process is
    /// already gone is skipped with a warning; the vote barrier still
    /// expects that peer, so its departure path covers the missing post.
    pub fn cancel_other_searches(&self) -> Result<usize> {
        self.with_net(|data| {
            let mut signalled = 0;
            for (slot, pid) in data.miners_pid.iter().enumerate() {
                if *pid == NO_PEER || slot == self.slot {
                    continue;
                }
                match kill(Pid::from_raw(*pid), Signal::SIGUSR2) {
                    Ok(()) => signalled += 1,
                    Err(Errno::ESRCH) => {
                        warn!("peer {pid} in slot {slot} is gone, not signalling it");
                    }
                    Err(source) => {
                        return Err(Error::PeerSignal {
                            pid: *pid,
                            source,
                        });
                    }
                }
            }
            Ok(signalled)
        })?
    }

    /// Writes this peer's ballot into its voting-pool slot.
    pub fn cast_ballot(&self, approve: bool) -> Result<()> {
        self.with_net(|data| {
            data.voting_pool[self.slot] = if approve { VOTE_YES } else { VOTE_NO };
        })
    }

    /// Counts the cast ballots.
    pub fn tally(&self) -> Result<Tally> {
        self.with_net(|data| Tally::count(&data.voting_pool))
    }

    /// The current electorate size.
    pub fn electorate(&self) -> Result<usize> {
        self.with_net(|data| data.total_miners as usize)
    }

    /// Round-transition reset of the registry: clears the winner marker,
    /// resets every ballot to absent, records the winner of a committed
    /// round, and reports the electorate for the `round` release.
    pub fn reset_for_next_round(&self, committed: bool) -> Result<usize> {
        self.with_net(|data| {
            data.current_winner = NO_PEER;
            data.voting_pool.fill(VOTE_ABSENT);
            if committed {
                data.last_winner = self.pid.as_raw();
            }
            data.total_miners as usize
        })
    }

    /// Orderly exit. `final_round_winner` says whether this peer won the
    /// last round it took part in.
    ///
    /// Vacates the wallet and the seat; the last peer out destroys the
    /// semaphores and unlinks both regions, anyone else covers the winner's
    /// update barrier with one deferred `updated` post. The mappings
    /// themselves die with the handle.
    pub fn depart(self, final_round_winner: bool) -> Result<()> {
        self.with_block(|block| block.wallets[self.slot] = WALLET_VACANT)?;

        let sems = self.sems();
        sems.net_mutex.wait()?;
        let last = unsafe {
            let data = &mut *self.net.as_ptr();
            data.miners_pid[self.slot] = NO_PEER;
            data.total_miners -= 1;
            data.total_miners <= 0
        };

        if last {
            info!("last miner leaving, destroying the net");
            unsafe {
                sems.net_mutex.destroy();
                sems.block_mutex.destroy();
                sems.round.destroy();
                sems.winner.destroy();
                sems.updated.destroy();
                sems.entry.destroy();
                sems.voting.destroy();
                sems.result.destroy();
            }
            if let Err(errno) = SharedRegion::<NetData>::unlink(&self.names.net) {
                warn!("could not unlink {}: {errno}", self.names.net);
            }
            if let Err(errno) = SharedRegion::<SharedBlock>::unlink(&self.names.block) {
                warn!("could not unlink {}: {errno}", self.names.block);
            }
        } else {
            sems.net_mutex.post()?;
            if !final_round_winner {
                // The departed seat is out of the electorate only now, so
                // this post (not an earlier one) is what the winner's
                // update barrier counts.
                sems.updated.post()?;
            }
            debug!("left the net, slot {} is free again", self.slot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_names(suffix: &str) -> (String, String) {
        let pid = std::process::id();
        (
            format!("/rushnet-net-{pid}-{suffix}"),
            format!("/rushnet-blk-{pid}-{suffix}"),
        )
    }

    #[test]
    fn first_free_slot_scans_in_order() {
        let mut pids = [NO_PEER; MAX_MINERS];
        assert_eq!(first_free_slot(&pids), Some(0));
        pids[0] = 100;
        pids[1] = 101;
        pids[3] = 103;
        assert_eq!(first_free_slot(&pids), Some(2));
        pids.fill(7);
        assert_eq!(first_free_slot(&pids), None);
    }

    #[test]
    fn tally_decision_table() {
        // (yes, no, commits)
        let table = [
            (0, 0, true),  // solo round, nobody else to ask
            (1, 0, true),
            (0, 1, false),
            (2, 1, true),
            (1, 1, false), // exact split rejects
            (3, 5, false),
        ];
        for (yes, no, commits) in table {
            assert_eq!(Tally { yes, no }.commits(), commits, "yes={yes} no={no}");
        }
    }

    #[test]
    fn tally_counts_only_cast_ballots() {
        let mut pool = [VOTE_ABSENT; MAX_MINERS];
        pool[0] = VOTE_YES;
        pool[5] = VOTE_NO;
        pool[17] = VOTE_YES;
        assert_eq!(Tally::count(&pool), Tally { yes: 2, no: 1 });
    }

    #[test]
    fn shared_block_accessors() {
        let mut block: SharedBlock = unsafe { std::mem::zeroed() };
        block.wallets.fill(WALLET_VACANT);
        block.solution = SOLUTION_ABSENT;
        assert_eq!(block.solution(), None);
        assert!(!block.is_valid());
        assert_eq!(block.occupied_wallets().count(), 0);

        block.solution = 99;
        block.is_valid = 1;
        block.wallets[0] = 3;
        block.wallets[7] = 0;
        assert_eq!(block.solution(), Some(99));
        assert!(block.is_valid());
        let wallets: Vec<_> = block.occupied_wallets().collect();
        assert_eq!(wallets, vec![(0, 3), (7, 0)]);
    }

    #[test]
    fn found_join_and_reclaim() {
        let (net_name, block_name) = unique_names("lifecycle");

        let founder =
            NetHandle::register_named(net_name.clone(), block_name.clone()).unwrap();
        assert_eq!(founder.slot(), 0);
        assert_eq!(founder.electorate().unwrap(), 1);

        // Same process, second handle: loses the create race, joins.
        let joiner = NetHandle::register_named(net_name.clone(), block_name.clone()).unwrap();
        assert_eq!(joiner.slot(), 1);
        assert_eq!(founder.electorate().unwrap(), 2);
        // The joiner's round ticket is waiting.
        assert!(founder.sems().round.try_wait().unwrap());
        // Joiner's wallet went live, founder's was live from init.
        founder
            .with_block(|block| {
                assert_eq!(block.wallets[0], 0);
                assert_eq!(block.wallets[1], 0);
                assert_eq!(block.wallets[2], WALLET_VACANT);
            })
            .unwrap();

        // Joiner leaves first: net survives, one updated post is deferred
        // to cover a winner barrier.
        joiner.depart(false).unwrap();
        assert_eq!(founder.electorate().unwrap(), 1);
        assert!(founder.sems().updated.try_wait().unwrap());

        // Founder leaves last: names are gone afterwards.
        founder.depart(false).unwrap();
        assert!(matches!(
            SharedRegion::<NetData>::open(&net_name),
            Err(Errno::ENOENT)
        ));
        assert!(matches!(
            SharedRegion::<SharedBlock>::open(&block_name),
            Err(Errno::ENOENT)
        ));
    }

    /// Scenario: the slot table is full. The real join path must refuse
    /// the newcomer with `CapacityExceeded` and leave the registry
    /// byte-identical, gates included.
    #[test]
    fn join_at_capacity_leaves_the_net_untouched() {
        let (net_name, block_name) = unique_names("capacity");
        let founder =
            NetHandle::register_named(net_name.clone(), block_name.clone()).unwrap();

        // Seat phantom peers in every remaining slot.
        founder
            .with_net(|data| {
                for (slot, pid) in data.miners_pid.iter_mut().enumerate().skip(1) {
                    *pid = 10_000 + slot as libc::pid_t;
                }
                data.total_miners = MAX_MINERS as i32;
            })
            .unwrap();

        let snapshot = |handle: &NetHandle| {
            handle
                .with_net(|data| {
                    (
                        data.miners_pid,
                        data.voting_pool,
                        data.total_miners,
                        data.current_winner,
                        data.last_winner,
                    )
                })
                .unwrap()
        };
        let before = snapshot(&founder);

        let refused = NetHandle::register_named(net_name.clone(), block_name.clone());
        assert!(matches!(refused, Err(Error::CapacityExceeded(MAX_MINERS))));

        // Registry untouched, and the refused joiner gave back the entry
        // token and posted no round ticket.
        assert_eq!(snapshot(&founder), before);
        assert!(founder.sems().entry.try_wait().unwrap());
        founder.sems().entry.post().unwrap();
        assert!(founder.sems().round.try_wait().unwrap()); // founder's own
        assert!(!founder.sems().round.try_wait().unwrap());

        // Vacate the phantom seats so the founder leaves last and unlinks.
        founder
            .with_net(|data| {
                for pid in &mut data.miners_pid[1..] {
                    *pid = NO_PEER;
                }
                data.total_miners = 1;
            })
            .unwrap();
        founder.depart(false).unwrap();
        assert!(matches!(
            SharedRegion::<NetData>::open(&net_name),
            Err(Errno::ENOENT)
        ));
    }

    /// A full reject round, single-threaded: the claimed solution does not
    /// hash to the target, the voter says no, the exact split `0/1` drops
    /// the block, and the transition clears the proposal but keeps target
    /// and id for the retry.
    #[test]
    fn rejected_round_keeps_target_and_id() {
        let (net_name, block_name) = unique_names("reject");
        let founder = NetHandle::register_named(net_name.clone(), block_name.clone()).unwrap();
        let joiner = NetHandle::register_named(net_name, block_name).unwrap();
        let sems = founder.sems();

        // Both electors take their round ticket.
        assert!(sems.round.try_wait().unwrap());
        assert!(sems.round.try_wait().unwrap());
        let target = founder.with_block(|block| block.target).unwrap();

        // Founder claims with a bogus preimage.
        sems.winner.wait().unwrap();
        assert!(founder.try_claim_winner().unwrap());
        sems.entry.wait().unwrap();
        let electorate = founder.electorate().unwrap();
        assert_eq!(electorate, 2);
        // Guaranteed wrong: the map is a bijection, so at most one of 0
        // and 1 can be the real preimage.
        let bogus: u64 = if puzzle::hash(0) == target { 1 } else { 0 };
        founder
            .with_block(|block| block.solution = bogus as i64)
            .unwrap();
        sems.winner.post().unwrap();

        // The joiner judges the candidate and votes no.
        sems.winner.wait().unwrap();
        let (candidate, current_target) = joiner
            .with_block(|block| (block.solution(), block.target))
            .unwrap();
        let approve = candidate.is_some_and(|s| puzzle::hash(s) == current_target);
        assert!(!approve);
        joiner.cast_ballot(approve).unwrap();
        sems.voting.post().unwrap();
        sems.winner.post().unwrap();

        // Founder tallies: 0 yes / 1 no rejects.
        assert!(sems.voting.try_wait().unwrap());
        let tally = founder.tally().unwrap();
        assert_eq!(tally, Tally { yes: 0, no: 1 });
        assert!(!tally.commits());
        sems.result.post().unwrap();

        // The joiner sees no committed block and confirms the rejection.
        assert!(sems.result.try_wait().unwrap());
        assert!(!joiner.with_block(|block| block.is_valid()).unwrap());
        sems.updated.post().unwrap();
        assert!(sems.updated.try_wait().unwrap());

        // Transition after a rejection: proposal cleared, target and id
        // untouched, pool and winner marker reset.
        founder
            .with_block(|block| block.solution = SOLUTION_ABSENT)
            .unwrap();
        let next = founder.reset_for_next_round(false).unwrap();
        assert_eq!(next, 2);
        founder
            .with_block(|block| {
                assert_eq!(block.target, target);
                assert_eq!(block.id, 1);
                assert_eq!(block.solution(), None);
            })
            .unwrap();
        founder
            .with_net(|data| {
                assert_eq!(data.current_winner, NO_PEER);
                assert_eq!(data.last_winner, NO_PEER);
                assert!(data.voting_pool.iter().all(|ballot| *ballot == VOTE_ABSENT));
            })
            .unwrap();

        joiner.depart(false).unwrap();
        founder.depart(true).unwrap();
    }

    #[test]
    fn winner_claim_is_exclusive() {
        let (net_name, block_name) = unique_names("claim");
        let founder = NetHandle::register_named(net_name.clone(), block_name.clone()).unwrap();
        let joiner = NetHandle::register_named(net_name, block_name).unwrap();

        assert!(founder.try_claim_winner().unwrap());
        assert!(!joiner.try_claim_winner().unwrap());
        assert!(!founder.try_claim_winner().unwrap());

        assert_eq!(founder.reset_for_next_round(true).unwrap(), 2);
        // After the reset the marker is free again and the pool is clean.
        assert!(joiner.try_claim_winner().unwrap());
        assert_eq!(joiner.tally().unwrap(), Tally { yes: 0, no: 0 });

        joiner.depart(true).unwrap();
        founder.depart(false).unwrap();
    }
}
