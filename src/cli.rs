use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::config::LedgerConfig;
use crate::staking::{
    Address, AssetClass, CallContext, DelegationOperations, EpochManager, InMemoryCustody,
    OpenAllowList, RewardsDistributor, SlashingOperations, StakingLedger, ValidatorOperations,
};
use crate::storage::LedgerStorage;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic staking scenario against in-memory custody
    Simulate {
        /// Number of validators
        #[arg(short, long, default_value_t = 3)]
        validators: usize,

        /// Number of delegators
        #[arg(short, long, default_value_t = 6)]
        delegators: usize,

        /// Epochs to run
        #[arg(short, long, default_value_t = 5)]
        epochs: u64,

        /// Ledger config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to write the final ledger state
        #[arg(short, long)]
        state: Option<PathBuf>,
    },

    /// Print the effective ledger parameters as JSON
    Params {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Page through the validators of a saved ledger state
    Inspect {
        #[arg(short, long)]
        state: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 0)]
        cursor: usize,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<LedgerConfig> {
    match path {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(LedgerConfig::default()),
    }
}

fn identity(role: &str, index: usize) -> Result<Address> {
    Ok(Address::from_public_key(format!("{}-{}", role, index).as_bytes())?)
}

#[derive(Default)]
pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_command(&mut self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Simulate {
                validators,
                delegators,
                epochs,
                config,
                state,
            } => {
                let config = load_config(config.as_ref())?;
                let ledger = simulate(config, validators, delegators, epochs)?;
                if let Some(path) = state {
                    LedgerStorage::new(&path).save(ledger.state())?;
                    info!("Ledger state written to {}", path.display());
                }
                Ok(())
            }

            Commands::Params { config } => {
                let config = load_config(config.as_ref())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }

            Commands::Inspect {
                state,
                config,
                cursor,
                limit,
            } => {
                let config = load_config(config.as_ref())?;
                let saved = LedgerStorage::new(&state)
                    .load()
                    .with_context(|| format!("failed to load state from {}", state.display()))?;
                let ledger = StakingLedger::from_state(
                    saved,
                    config,
                    InMemoryCustody::new(),
                    Box::new(OpenAllowList),
                );
                let page = ledger.validators(ledger.head_epoch(), cursor, limit);
                println!("{}", serde_json::to_string_pretty(&page)?);
                Ok(())
            }
        }
    }
}

/// Registers validators, stakes from delegators and drives `epochs` epochs
/// of block accounting, slashes, claims and transitions.
pub fn simulate(
    config: LedgerConfig,
    validator_count: usize,
    delegator_count: usize,
    epochs: u64,
) -> Result<StakingLedger<InMemoryCustody>> {
    if validator_count == 0 {
        bail!("simulation needs at least one validator");
    }
    if config.genesis.epoch_length < 3 {
        bail!("simulation needs epochs of at least 3 blocks");
    }
    let params = config.genesis.clone();
    let stake_unit = params.candidacy_threshold.max(1);

    let owners = (0..validator_count)
        .map(|i| identity("owner", i))
        .collect::<Result<Vec<_>>>()?;
    let operators = (0..validator_count)
        .map(|i| identity("operator", i))
        .collect::<Result<Vec<_>>>()?;
    let delegators = (0..delegator_count)
        .map(|i| identity("delegator", i))
        .collect::<Result<Vec<_>>>()?;

    let mut custody = InMemoryCustody::new();
    for (i, delegator) in delegators.iter().enumerate() {
        custody.credit(*delegator, AssetClass::Native, stake_unit * (i as u128 + 2));
    }
    let mut ledger = StakingLedger::new(config, custody, Box::new(OpenAllowList))?;
    let producer = operators[0];
    let at = |block: u64, caller: Address| {
        CallContext::new(caller, block, block * params.block_duration, producer)
    };

    for (owner, operator) in owners.iter().zip(&operators) {
        ledger.register_validator(&at(0, *owner), *operator)?;
    }
    for (i, delegator) in delegators.iter().enumerate() {
        let validator = owners[i % owners.len()];
        ledger.stake(&at(0, *delegator), &validator, AssetClass::Native, stake_unit * (i as u128 + 1))?;
    }

    let per_validator = params.epoch_length / validator_count as u64;
    let (mut rewards, mut commission) = (0, 0);
    let first = ledger.current_epoch(0);
    for epoch in first..first.saturating_add(epochs) {
        let start = ledger.state().clock.epoch_start_block(epoch);
        let length = ledger.parameters_at(epoch).epoch_length;

        let counts = vec![per_validator; operators.len()];
        ledger.record_expected_blocks(&at(start, producer), &operators, &counts)?;

        let slashed = operators[epoch as usize % operators.len()];
        for _ in 0..epoch % 3 {
            ledger.record_slash(&at(start + 1, producer), &slashed)?;
        }

        for (i, delegator) in delegators.iter().enumerate() {
            let validator = owners[i % owners.len()];
            rewards += ledger.claim_reward(&at(start + 1, *delegator), &validator, epochs)?;
        }
        for owner in &owners {
            commission += ledger.claim_commission(&at(start + 1, *owner), owner, epochs)?;
        }

        let snapshot = ledger.transition_epoch(&at(start + length - 1, producer))?;
        info!(
            "Epoch {}: {} candidates ({} queued for the next)",
            snapshot.epoch,
            snapshot.current.len(),
            snapshot.next.len()
        );
    }

    let head = ledger.head_epoch();
    for owner in &owners {
        info!(
            "Validator {} stake {} at epoch {}",
            owner,
            ledger.total_stake(owner, head)?,
            head
        );
    }
    info!("Paid {} in rewards and {} in commission", rewards, commission);
    Ok(ledger)
}
