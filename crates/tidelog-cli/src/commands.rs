use anyhow::Context;
use colored::Colorize;
use tidelog_store::{ObjectRecord, ObjectStore, StoreConfig};

use crate::cli::*;
use crate::repro;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Config => cmd_config(&config),
        Command::Repro(ref args) => repro::run(args, &cli, config).await,
        Command::Put(ref args) => cmd_put(&open_store(&cli, config)?, args).await,
        Command::Get(ref args) => cmd_get(&open_store(&cli, config)?, args).await,
        Command::Info(ref args) => cmd_info(&open_store(&cli, config)?, args, cli.format).await,
        Command::Delete(ref args) => cmd_delete(&open_store(&cli, config)?, args).await,
        Command::List => cmd_list(&open_store(&cli, config)?, cli.format).await,
        Command::Watermark => cmd_watermark(&open_store(&cli, config)?).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(bucket) = &cli.bucket {
        config.bucket = bucket.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.operation_timeout_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn open_store(cli: &Cli, config: StoreConfig) -> anyhow::Result<ObjectStore> {
    ObjectStore::open_file(&cli.log, config)
        .with_context(|| format!("opening log {}", cli.log.display()))
}

fn cmd_config(config: &StoreConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

async fn cmd_put(store: &ObjectStore, args: &PutArgs) -> anyhow::Result<()> {
    let payload = match (&args.value, &args.input) {
        (Some(value), _) => value.clone().into_bytes(),
        (None, Some(path)) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        (None, None) => anyhow::bail!("put needs a value or --input"),
    };
    let size = payload.len();
    let seq = store.put(&args.key, payload, store.deadline()).await?;
    println!(
        "{} Stored {} ({} bytes) at {}",
        "✓".green().bold(),
        args.key.bold(),
        size,
        seq.to_string().yellow()
    );
    Ok(())
}

async fn cmd_get(store: &ObjectStore, args: &KeyArgs) -> anyhow::Result<()> {
    let payload = store.get(&args.key, store.deadline()).await?;
    println!("{}", String::from_utf8_lossy(&payload));
    Ok(())
}

async fn cmd_info(store: &ObjectStore, args: &KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let record = store.info(&args.key, store.deadline()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => {
            println!("{}", record.key.as_str().bold());
            println!("  Sequence: {}", record.last_sequence.to_string().yellow());
            println!("  Size: {} bytes", record.size);
            if let Some(digest) = &record.digest {
                println!("  Digest: {}", digest.to_string().cyan());
            }
            println!("  Modified: {}", record.modified.to_rfc3339());
        }
    }
    Ok(())
}

async fn cmd_delete(store: &ObjectStore, args: &KeyArgs) -> anyhow::Result<()> {
    let seq = store.delete(&args.key, store.deadline()).await?;
    println!("Deleted {} at {}", args.key.bold(), seq.to_string().yellow());
    Ok(())
}

async fn cmd_list(store: &ObjectStore, format: OutputFormat) -> anyhow::Result<()> {
    let listing = store.listing(store.deadline()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Text => {
            if listing.is_empty() {
                println!("No objects in {} ({}).", listing.bucket.as_str().bold(), listing.watermark);
            }
            for record in &listing.records {
                print_record_line(record);
            }
        }
    }
    Ok(())
}

fn print_record_line(record: &ObjectRecord) {
    let digest = record.digest.map(|d| d.short_hex()).unwrap_or_default();
    println!(
        "{:>8}  {:>10}  {}  {}",
        record.last_sequence.to_string().yellow(),
        record.size,
        digest.dimmed(),
        record.key
    );
}

async fn cmd_watermark(store: &ObjectStore) -> anyhow::Result<()> {
    let watermark = store.watermark(store.deadline()).await?;
    println!("{}: {}", store.bucket().as_str().bold(), watermark);
    Ok(())
}
