//! CLI command implementations.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use relaygate_codec::{decode, decode_exact, encode};
use relaygate_core::{
    transfer_authority, transition_gaps, ForwardMode, Governance, GovernanceState, Guard,
    InMemoryTimelock, PolicyEntry, StateSnapshot,
};
use relaygate_types::{Address, Batch, ChainId, Role, Selector};
use tracing::{debug, info};

use crate::config::{parse_selector, RelayConfig};
use crate::metrics::RelayMetrics;
use crate::output::*;

/// Main CLI.
#[derive(Parser, Debug)]
#[command(name = "relaygate")]
#[command(about = "Relaygate - cross-chain governance relay and selector firewall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "RELAYGATE_CONFIG", default_value = "relaygate.toml")]
    pub config: PathBuf,

    /// Override the state snapshot path
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Account to act as (defaults to the configured admin)
    #[arg(long, global = true)]
    pub caller: Option<Address>,

    /// Log level
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a JSON batch file into the wire format
    Encode {
        /// JSON array of {target, value, payload}
        file: PathBuf,
    },

    /// Decode a hex command buffer
    Decode {
        /// Hex buffer, with or without 0x
        hex: String,

        /// Expect exactly this many instructions
        #[arg(long)]
        count: Option<usize>,
    },

    /// Compute the selector of a function signature
    Selector {
        /// e.g. "transfer(address,uint256)"
        signature: String,
    },

    /// Review a batch against the selector policies
    Review {
        /// JSON array of {target, value, payload}
        file: PathBuf,

        /// Chain the batch executes on (defaults to the home chain)
        #[arg(long)]
        chain_id: Option<ChainId>,

        /// Forward to a local timelock when the review passes
        #[arg(long, value_enum)]
        forward: Option<ForwardArg>,
    },

    /// Remote mediator registry
    #[command(subcommand)]
    Mediator(MediatorCommands),

    /// Selector allow-list
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Mark a bridge entrypoint so the guard inspects what it carries
    Route {
        entrypoint: Address,

        /// Chain the bridged batches execute on
        destination: ChainId,
    },

    /// Hand roles from one account to another
    Transition {
        #[arg(long)]
        old: Address,

        #[arg(long)]
        new: Address,

        /// Roles to move (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "admin,proposer,executor,canceller")]
        roles: Vec<Role>,

        /// Apply all steps at once, refusing an admin lockout
        #[arg(long)]
        atomic: bool,

        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MediatorCommands {
    /// Trust `address` as the mediator of `chain_id`
    Set { chain_id: ChainId, address: Address },

    /// Show one chain's mediator, or all of them
    Show { chain_id: Option<ChainId> },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Allow (or with --deny, forbid) a selector on a target
    Set {
        target: Address,

        /// Hex selector or function signature
        selector: String,

        chain_id: ChainId,

        #[arg(long)]
        deny: bool,
    },

    /// Show whether a call is allowed
    Check {
        target: Address,
        selector: String,
        chain_id: ChainId,
    },

    /// List every configured entry
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ForwardArg {
    Schedule,
    Execute,
}

impl From<ForwardArg> for ForwardMode {
    fn from(arg: ForwardArg) -> Self {
        match arg {
            ForwardArg::Schedule => ForwardMode::Schedule,
            ForwardArg::Execute => ForwardMode::Execute,
        }
    }
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: RelayConfig,
    pub config_path: PathBuf,
    pub caller: Address,
    pub metrics: RelayMetrics,
}

/// Load the governance state, seeding it from the config on first use.
pub fn open_state(config: &RelayConfig) -> anyhow::Result<Governance> {
    if config.state_path.exists() {
        let snapshot = StateSnapshot::load(&config.state_path)?;
        debug!(path = %config.state_path.display(), "Loaded state snapshot");
        return Ok(Governance::from_state(GovernanceState::from_snapshot(snapshot)?));
    }

    let gov = Governance::new(config.admin);
    for mediator in &config.mediators {
        gov.set_mediator(config.admin, mediator.chain_id, mediator.address)?;
    }
    let entries = config
        .policies
        .iter()
        .map(|p| Ok(PolicyEntry::new(p.target, p.selector()?, p.chain_id, p.allowed)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if !entries.is_empty() {
        gov.set_policies(config.admin, &entries)?;
    }
    for route in &config.bridge_routes {
        gov.set_bridge_route(config.admin, route.entrypoint, route.destination_chain)?;
    }
    info!(name = %config.name, "Initialized governance state from config");
    Ok(gov)
}

pub fn save_state(config: &RelayConfig, gov: &Governance) -> anyhow::Result<()> {
    gov.snapshot().save(&config.state_path)?;
    Ok(())
}

pub fn read_batch(path: &Path) -> anyhow::Result<Batch> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read batch file '{}': {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse batch file '{}': {}", path.display(), e))
}

fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    Ok(hex::decode(stripped)?)
}

/// Execute a command.
pub fn execute(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Encode { file } => {
            let encoded = encode_file(&file)?;
            println!("{}", format_bytes(&encoded));
            print_info(&format!("{} bytes", encoded.len()));
        }
        Commands::Decode { hex, count } => {
            let batch = decode_hex(ctx, &hex, count)?;
            println!("{}", batch_table(&batch));
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        Commands::Selector { signature } => {
            println!("{}", Selector::from_signature(&signature)?);
        }
        Commands::Review {
            file,
            chain_id,
            forward,
        } => {
            let batch = read_batch(&file)?;
            let chain_id = chain_id.unwrap_or(ctx.config.home_chain_id);
            review(ctx, &batch, chain_id, forward.map(ForwardMode::from))?;
        }
        Commands::Mediator(cmd) => mediator(ctx, cmd)?,
        Commands::Policy(cmd) => policy(ctx, cmd)?,
        Commands::Route {
            entrypoint,
            destination,
        } => {
            let gov = open_state(&ctx.config)?;
            gov.set_bridge_route(ctx.caller, entrypoint, destination)?;
            save_state(&ctx.config, &gov)?;
            print_success(&format!("Calls to {} now inspected for chain {}", entrypoint, destination));
        }
        Commands::Transition {
            old,
            new,
            roles,
            atomic,
            dry_run,
        } => transition(ctx, old, new, roles, atomic, dry_run)?,
        Commands::Init { force } => init(&ctx.config_path, force)?,
    }
    Ok(())
}

pub fn encode_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let batch = read_batch(path)?;
    Ok(encode(&batch)?)
}

pub fn decode_hex(ctx: &Context, input: &str, count: Option<usize>) -> anyhow::Result<Batch> {
    let bytes = parse_hex(input)?;
    let result = match count {
        Some(count) => decode_exact(&bytes, count),
        None => decode(&bytes),
    };
    result.map_err(|e| {
        ctx.metrics.decode_failures.inc();
        anyhow::anyhow!("Failed to decode command buffer: {}", e)
    })
}

/// Review `batch` and optionally forward it to a local timelock.
///
/// Execute mode schedules first and advances the local clock past the delay,
/// since a timelock only executes what it has scheduled.
pub fn review(
    ctx: &Context,
    batch: &Batch,
    chain_id: ChainId,
    forward: Option<ForwardMode>,
) -> anyhow::Result<()> {
    let gov = open_state(&ctx.config)?;
    let guard = Guard::new(ctx.config.operator);

    let Some(mode) = forward else {
        let verdict = guard.review(&gov.read(), batch, chain_id);
        ctx.metrics.record_review(verdict.is_ok());
        verdict?;
        print_success(&format!("All {} instructions allowed on chain {}", batch.len(), chain_id));
        return Ok(());
    };

    let mut timelock = InMemoryTimelock::new(ctx.config.timelock.address, ctx.config.timelock.min_delay);
    timelock.setup_role(Role::Proposer, guard.operator());
    timelock.setup_role(Role::Executor, guard.operator());

    let mut result = guard.review_and_forward(&gov, &mut timelock, batch, chain_id, ForwardMode::Schedule);
    if mode == ForwardMode::Execute && result.is_ok() {
        timelock.advance(timelock.min_delay());
        result = guard.review_and_forward(&gov, &mut timelock, batch, chain_id, ForwardMode::Execute);
    }
    ctx.metrics.record_review(result.is_ok());
    let id = result?;

    print_success(&format!("Batch forwarded ({})", mode));
    println!("Operation: {}", id.to_string().bright_cyan());
    println!("{}", batch_table(batch));
    Ok(())
}

fn mediator(ctx: &Context, cmd: MediatorCommands) -> anyhow::Result<()> {
    match cmd {
        MediatorCommands::Set { chain_id, address } => {
            let gov = open_state(&ctx.config)?;
            let previous = gov.set_mediator(ctx.caller, chain_id, address)?;
            save_state(&ctx.config, &gov)?;
            ctx.metrics.mediator_updates.inc();

            print_success(&format!("Chain {} mediator set to {}", chain_id, address));
            if let Some(previous) = previous.filter(|p| *p != address) {
                print_warning(&format!("{} is no longer trusted", previous));
            }
        }
        MediatorCommands::Show { chain_id: Some(chain_id) } => {
            let gov = open_state(&ctx.config)?;
            match gov.mediator_of(chain_id) {
                Some(mediator) => println!("{}", mediator),
                None => print_warning(&format!("No mediator registered for chain {}", chain_id)),
            }
        }
        MediatorCommands::Show { chain_id: None } => {
            let gov = open_state(&ctx.config)?;
            let state = gov.read();
            if state.mediators().is_empty() {
                print_info("No mediators registered");
            } else {
                println!("{}", mediator_table(state.mediators().records()));
            }
        }
    }
    Ok(())
}

fn policy(ctx: &Context, cmd: PolicyCommands) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Set {
            target,
            selector,
            chain_id,
            deny,
        } => {
            let selector = parse_selector(&selector)?;
            let gov = open_state(&ctx.config)?;
            let applied = gov.set_policies(ctx.caller, &[PolicyEntry::new(target, selector, chain_id, !deny)])?;
            save_state(&ctx.config, &gov)?;
            ctx.metrics.policy_updates.inc_by(applied as u64);

            let verb = if deny { "denied" } else { "allowed" };
            print_success(&format!("{} on {} {} for chain {}", selector, target, verb, chain_id));
        }
        PolicyCommands::Check {
            target,
            selector,
            chain_id,
        } => {
            let selector = parse_selector(&selector)?;
            let gov = open_state(&ctx.config)?;
            let status = gov.read().policies().lookup(&target, &selector, chain_id);
            match status {
                Some(true) => print_success("allowed"),
                Some(false) => print_error("denied"),
                None => print_error("denied (never configured)"),
            }
        }
        PolicyCommands::List => {
            let gov = open_state(&ctx.config)?;
            let state = gov.read();
            println!("{}", policy_table(state.policies().entries()));
            print_info(&format!(
                "{} allowed, {} changes recorded",
                state.policies().allowed_count(),
                state.policies().history().len()
            ));
        }
    }
    Ok(())
}

fn transition(
    ctx: &Context,
    old: Address,
    new: Address,
    roles: Vec<Role>,
    atomic: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let gov = open_state(&ctx.config)?;
    let plan = transfer_authority(old, new, roles.iter().copied());
    print_role_plan(&plan);

    if !atomic {
        for gap in transition_gaps(gov.read().roles(), &plan) {
            print_warning(&gap.to_string());
        }
    }
    if dry_run {
        print_info("Dry run, nothing applied");
        return Ok(());
    }

    if atomic {
        gov.transfer_authority_atomic(ctx.caller, old, new, roles)?;
    } else {
        gov.transfer_authority(ctx.caller, old, new, roles)?;
    }
    save_state(&ctx.config, &gov)?;
    print_success(&format!("Roles moved from {} to {}", format_address_short(&old), format_address_short(&new)));
    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    RelayConfig::default().to_file(path)?;
    print_success(&format!("Wrote default config to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MediatorConfig, PolicyConfig};
    use relaygate_types::Instruction;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        let mut config = RelayConfig::default();
        config.state_path = dir.path().join("state.bin");
        config.timelock.min_delay = 60;
        Context {
            caller: config.admin,
            config,
            config_path: dir.path().join("relaygate.toml"),
            metrics: RelayMetrics::new().unwrap(),
        }
    }

    fn write_batch(dir: &TempDir, batch: &Batch) -> PathBuf {
        let path = dir.path().join("batch.json");
        std::fs::write(&path, serde_json::to_string(batch).unwrap()).unwrap();
        path
    }

    fn transfer_call(target: u8) -> Instruction {
        let selector = Selector::from_signature("transfer(address,uint256)").unwrap();
        Instruction::call(Address::repeat_byte(target), selector, &[0; 64])
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "relaygate",
            "transition",
            "--old",
            "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
            "--new",
            "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b",
            "--roles",
            "admin,proposer",
        ])
        .unwrap();
        match cli.command {
            Commands::Transition { roles, atomic, .. } => {
                assert_eq!(roles, vec![Role::Admin, Role::Proposer]);
                assert!(!atomic);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_encode_then_decode_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let batch = Batch::new(vec![transfer_call(1), transfer_call(2)]).unwrap();

        let encoded = encode_file(&write_batch(&dir, &batch)).unwrap();
        let decoded = decode_hex(&ctx, &format_bytes(&encoded), Some(2)).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_decode_failure_counted() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        assert!(decode_hex(&ctx, "0x0102", None).is_err());
        assert!(decode_hex(&ctx, "zz", None).is_err());
        assert_eq!(ctx.metrics.decode_failures.get(), 1);
    }

    #[test]
    fn test_state_seeded_from_config_and_persisted() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.config.mediators.push(MediatorConfig {
            chain_id: 137,
            address: Address::repeat_byte(0x22),
        });

        mediator(
            &ctx,
            MediatorCommands::Set {
                chain_id: 10,
                address: Address::repeat_byte(0x33),
            },
        )
        .unwrap();
        assert!(ctx.config.state_path.exists());

        let gov = open_state(&ctx.config).unwrap();
        assert_eq!(gov.mediator_of(137), Some(Address::repeat_byte(0x22)));
        assert_eq!(gov.mediator_of(10), Some(Address::repeat_byte(0x33)));
        assert_eq!(ctx.metrics.mediator_updates.get(), 1);
    }

    #[test]
    fn test_non_admin_cannot_set_policy() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.caller = Address::repeat_byte(0x99);

        let result = policy(
            &ctx,
            PolicyCommands::Set {
                target: Address::repeat_byte(1),
                selector: "0xa9059cbb".to_string(),
                chain_id: 1,
                deny: false,
            },
        );
        assert!(result.is_err());
        assert!(!ctx.config.state_path.exists());
    }

    #[test]
    fn test_review_and_execute() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        for target in [1, 2] {
            ctx.config.policies.push(PolicyConfig {
                target: Address::repeat_byte(target),
                selector: "transfer(address,uint256)".to_string(),
                chain_id: 1,
                allowed: true,
            });
        }

        let allowed = Batch::new(vec![transfer_call(1), transfer_call(2)]).unwrap();
        review(&ctx, &allowed, 1, Some(ForwardMode::Execute)).unwrap();

        let blocked = Batch::new(vec![transfer_call(1), transfer_call(3)]).unwrap();
        assert!(review(&ctx, &blocked, 1, None).is_err());

        assert_eq!(ctx.metrics.batches_forwarded.get(), 1);
        assert_eq!(ctx.metrics.batches_rejected.get(), 1);
    }

    #[test]
    fn test_transition_moves_admin() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let successor = Address::repeat_byte(0xbe);

        transition(&ctx, ctx.config.admin, successor, vec![Role::Admin], false, false).unwrap();

        let gov = open_state(&ctx.config).unwrap();
        assert_eq!(gov.read().roles().holders(Role::Admin), vec![successor]);
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        transition(&ctx, ctx.config.admin, Address::repeat_byte(0xbe), vec![Role::Admin], true, true)
            .unwrap();
        assert!(!ctx.config.state_path.exists());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relaygate.toml");

        init(&path, false).unwrap();
        assert!(init(&path, false).is_err());
        assert!(init(&path, true).is_ok());
        assert_eq!(RelayConfig::from_file(&path).unwrap(), RelayConfig::default());
    }
}
