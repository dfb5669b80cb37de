// Copyright (c) Rushnet Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `miner` binary: one peer of the mining net.

use clap::Parser;
use color_eyre::Result;
use log::LevelFilter;
use logforth::append;

use rushnet::{Miner, MinerConfig, signals};

/// One peer of the local proof-of-work mining net.
///
/// The first `miner` started founds the net; every further one joins it.
/// Stop a peer with Ctrl-C; the last peer out removes the shared state.
#[derive(Debug, Parser)]
#[command(name = "miner", version)]
struct Cli {
    /// Parallel search workers for this peer.
    #[arg(value_parser = clap::value_parser!(u8).range(1..=10))]
    n_workers: u8,
    /// Committed rounds to mine before leaving; zero or less mines until
    /// interrupted.
    #[arg(allow_negative_numbers = true)]
    n_rounds: i64,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    logforth::builder()
        .dispatch(|dispatch| {
            dispatch
                .filter(LevelFilter::Info)
                .append(append::Stderr::default())
        })
        .apply();

    let cli = Cli::parse();
    signals::install()?;

    let miner = Miner::register(MinerConfig {
        workers: usize::from(cli.n_workers),
        rounds: cli.n_rounds,
    })?;
    let chain = miner.run()?;
    println!("{chain}");
    Ok(())
}
