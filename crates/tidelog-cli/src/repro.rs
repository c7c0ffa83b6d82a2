//! Put / list / delete cycle that checks every listing against the expected
//! live set and fails when a list misses its deadline.

use std::collections::BTreeSet;
use std::time::Instant as WallClock;

use colored::Colorize;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tidelog_store::{ObjectStore, StoreConfig};
use tracing::info;

use crate::cli::{Cli, ReproArgs};

pub async fn run(args: &ReproArgs, cli: &Cli, config: StoreConfig) -> anyhow::Result<()> {
    anyhow::ensure!(args.count > 0, "--count must be at least 1");
    let store = if args.durable {
        ObjectStore::open_file(&cli.log, config)?
    } else {
        ObjectStore::in_memory(config)?
    };

    let baseline = store.list(store.deadline()).await?.len();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let names = object_names(&mut rng, args.count, args.depth.max(1));

    println!(
        "Bucket {}: {} objects, timeout {} ms",
        store.bucket().as_str().bold(),
        names.len(),
        store.config().operation_timeout_ms
    );

    for name in &names {
        let payload: Vec<u8> = (0..args.size).map(|_| rng.gen()).collect();
        store.put(name, payload, store.deadline()).await?;
    }
    check_count(&store, "after puts", baseline + names.len()).await?;

    let (last, rest) = names
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("no objects generated"))?;
    for name in rest {
        store.delete(name, store.deadline()).await?;
    }
    check_count(&store, "after deleting all but one", baseline + 1).await?;

    store.delete(last, store.deadline()).await?;
    check_count(&store, "after deleting the last", baseline).await?;

    println!("{} Every listing terminated with the expected count.", "✓".green().bold());
    Ok(())
}

async fn check_count(store: &ObjectStore, phase: &str, expected: usize) -> anyhow::Result<()> {
    let started = WallClock::now();
    let listing = store.listing(store.deadline()).await?;
    let elapsed = started.elapsed();
    info!(phase, expected, found = listing.len(), watermark = %listing.watermark, ?elapsed, "listing checked");
    anyhow::ensure!(
        listing.len() == expected,
        "list {phase}: expected {expected} objects, found {}",
        listing.len()
    );
    println!(
        "  {} list {}: {} objects at {} in {:?}",
        "✓".green(),
        phase,
        listing.len(),
        listing.watermark.to_string().yellow(),
        elapsed
    );
    Ok(())
}

/// `count` distinct names shaped like `/seg/seg/obj-seg`.
fn object_names(rng: &mut StdRng, count: usize, depth: usize) -> Vec<String> {
    let mut names = BTreeSet::new();
    while names.len() < count {
        let mut name = String::new();
        for _ in 1..depth {
            name.push('/');
            name.push_str(&segment(rng, 6));
        }
        name.push_str("/obj-");
        name.push_str(&segment(rng, 12));
        names.insert(name);
    }
    names.into_iter().collect()
}

fn segment(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
