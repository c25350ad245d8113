//! Debate ledger administration binary
//!
//! ```text
//! debate-ledger migrate-names
//! debate-ledger history <participant-id>
//! debate-ledger stats <participant-id>
//! debate-ledger achievements <participant-id>
//! debate-ledger toggle <participant-id> <achievement-id>
//! debate-ledger delete <match-id>
//! debate-ledger leaderboard
//! ```
//!
//! Configuration comes from the TOML file named by `DEBATE_LEDGER_CONFIG`,
//! otherwise from `DEBATE_LEDGER_*` environment variables.

use anyhow::{bail, Context};
use debate_ledger::{
    config::LogFormat, Config, FileStore, MatchId, MatchLedger, ParticipantId, ParticipantStore,
    Receipt, Store,
};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: debate-ledger <migrate-names | history <id> | stats <id> | \
achievements <id> | toggle <id> <achievement> | delete <match-id> | leaderboard>";

fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command: Vec<&str> = args.iter().map(String::as_str).collect();

    let store: Arc<dyn Store> =
        Arc::new(FileStore::open(&config).context("Failed to open data directory")?);
    let participants = Arc::new(ParticipantStore::new(store.clone()));
    let ledger = MatchLedger::from_parts(store, participants.clone(), config)?;

    tracing::debug!(?command, "Running admin command");

    match command.as_slice() {
        ["migrate-names"] => {
            let receipt = ledger.migrate_opponent_names()?;
            report(&receipt);
            println!("repaired {} records", receipt.value);
        }
        ["history", id] => print_json(&ledger.matches_for(participant_id(id)?)?)?,
        ["stats", id] => print_json(&ledger.stats(participant_id(id)?)?)?,
        ["achievements", id] => {
            print_json(&ledger.achievements().achievements(participant_id(id)?)?)?
        }
        ["toggle", id, achievement] => {
            print_json(&ledger.achievements().toggle(participant_id(id)?, achievement)?)?
        }
        ["delete", id] => {
            let id = MatchId::new(id.parse().with_context(|| format!("Invalid match id: {}", id))?);
            let receipt = ledger.delete_match(id)?;
            report(&receipt);
            match receipt.value {
                Some(record) => print_json(&record)?,
                None => println!("match {} not found, nothing deleted", id),
            }
        }
        ["leaderboard"] => print_json(&participants.leaderboard()?)?,
        _ => bail!(USAGE),
    }

    tracing::debug!(metrics = ?ledger.metrics(), "Admin command finished");
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var("DEBATE_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path)),
        Err(_) => Ok(Config::from_env()?),
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn participant_id(raw: &str) -> anyhow::Result<ParticipantId> {
    let id = raw
        .parse()
        .with_context(|| format!("Invalid participant id: {}", raw))?;
    Ok(ParticipantId::new(id))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report<T>(receipt: &Receipt<T>) {
    for warning in &receipt.warnings {
        eprintln!("warning: {}", warning);
    }
}
