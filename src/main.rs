use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mahjong::config::DeploymentConfig;
use mahjong::ledger::{Address, Amount, ContractCode, TokenId};
use mahjong::Deployment;

//==================== CLI ====================//

#[derive(Parser, Debug)]
#[command(name = "mahjong", version, about = "Mahjong multi-token ledger and airdrop")]
struct Cli {
    /// Deployment state file (JSON)
    #[arg(long, global = true, default_value = "mahjong.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a fresh deployment from a TOML config
    Init {
        #[arg(long)]
        config: PathBuf,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Token identity, admin and airdrop settings
    Info,
    /// Metadata URI for a token id
    Uri {
        #[arg(long)]
        id: TokenId,
    },
    /// Mint new supply (admin only)
    Mint {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        amount: Amount,
        /// Hook payload (hex)
        #[arg(long, default_value = "")]
        data: String,
    },
    Balance {
        #[arg(long)]
        account: Address,
        #[arg(long)]
        id: TokenId,
    },
    BalanceBatch {
        #[arg(long, value_delimiter = ',')]
        accounts: Vec<Address>,
        #[arg(long, value_delimiter = ',')]
        ids: Vec<TokenId>,
    },
    /// Safe transfer; runs the recipient's acceptance hook
    Transfer {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Grant (or with --revoke, withdraw) an operator over all of the caller's tokens
    Approve {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        operator: Address,
        #[arg(long)]
        revoke: bool,
    },
    IsApproved {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        operator: Address,
    },
    /// Mark an address as contract code: holder | opaque | rejecting
    DeployContract {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        code: ContractCode,
    },
    /// Hand token administration to another account
    TransferAdmin {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        new_admin: Address,
    },
    /// Configure the per-claim amount for an id (airdrop admin only, 0 clears)
    SetAirdrop {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        amount: Amount,
    },
    Claim {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        id: TokenId,
    },
    Claimed {
        #[arg(long)]
        account: Address,
        #[arg(long)]
        id: TokenId,
    },
    /// Move unclaimed custody out of the airdrop (airdrop admin only)
    Withdraw {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        id: TokenId,
        #[arg(long)]
        amount: Amount,
        #[arg(long)]
        to: Address,
    },
    /// Balances, supplies and the state root
    Snapshot,
}

//==================== helpers ====================//

fn init_tracing() {
    let filter = std::env::var("MAHJONG_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".into());
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn decode_data(data: &str) -> Result<Vec<u8>> {
    let trimmed = data.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(trimmed).with_context(|| format!("invalid --data hex {data:?}"))
}

fn load(path: &Path) -> Result<Deployment> {
    Deployment::load(path)
        .with_context(|| format!("no usable deployment at {} (run `mahjong init`)", path.display()))
}

fn print(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Loads the state, applies one mutation and saves only if it succeeded.
fn mutate<F>(path: &Path, op: F) -> Result<serde_json::Value>
where
    F: FnOnce(&mut Deployment) -> Result<serde_json::Value>,
{
    let mut deployment = load(path)?;
    let out = op(&mut deployment)?;
    deployment.save(path)?;
    Ok(out)
}

//==================== main ====================//

fn run(cli: Cli) -> Result<()> {
    let state = cli.state.as_path();
    match cli.cmd {
        Commands::Init { config, force } => {
            if state.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", state.display());
            }
            let config = DeploymentConfig::load(&config)?;
            let deployment = Deployment::genesis(&config)?;
            deployment.save(state)?;
            info!(state = %state.display(), "initialized");
            print(json!({
                "name": deployment.token().name(),
                "symbol": deployment.token().symbol(),
                "airdrop": deployment.airdrop().address(),
            }))
        }
        Commands::Info => {
            let d = load(state)?;
            let allotments: Vec<_> = d
                .airdrop()
                .registry()
                .configured()
                .map(|(id, amount)| json!({ "id": id, "amount_per_claim": amount, "claims": d.airdrop().claims_for(id) }))
                .collect();
            print(json!({
                "name": d.token().name(),
                "symbol": d.token().symbol(),
                "admin": d.token().dao().admin(),
                "height": d.token().ledger().meta.height,
                "airdrop": {
                    "address": d.airdrop().address(),
                    "admin": d.airdrop().admin(d.token()),
                    "rule": d.airdrop().rule(),
                    "allotments": allotments,
                },
            }))
        }
        Commands::Uri { id } => {
            let d = load(state)?;
            print(json!({ "id": id, "uri": d.token().uri(id) }))
        }
        Commands::Mint {
            caller,
            to,
            id,
            amount,
            data,
        } => {
            let data = decode_data(&data)?;
            let out = mutate(state, |d| {
                d.token_mut().mint(&caller, &to, id, amount, &data)?;
                Ok(json!({ "to": to, "id": id, "balance": d.token().balance_of(&to, id), "total_supply": d.token().total_supply(id) }))
            })?;
            print(out)
        }
        Commands::Balance { account, id } => {
            let d = load(state)?;
            print(json!({ "account": account, "id": id, "balance": d.token().balance_of(&account, id) }))
        }
        Commands::BalanceBatch { accounts, ids } => {
            let d = load(state)?;
            let balances = d.token().balance_of_batch(&accounts, &ids)?;
            print(json!({ "balances": balances }))
        }
        Commands::Transfer {
            caller,
            from,
            to,
            id,
            amount,
            data,
        } => {
            let data = decode_data(&data)?;
            let out = mutate(state, |d| {
                d.token_mut()
                    .safe_transfer_from(&caller, &from, &to, id, amount, &data)?;
                Ok(json!({
                    "id": id,
                    "from_balance": d.token().balance_of(&from, id),
                    "to_balance": d.token().balance_of(&to, id),
                }))
            })?;
            print(out)
        }
        Commands::Approve {
            caller,
            operator,
            revoke,
        } => {
            let out = mutate(state, |d| {
                d.token_mut()
                    .set_approval_for_all(&caller, &operator, !revoke)?;
                Ok(json!({ "owner": caller, "operator": operator, "approved": !revoke }))
            })?;
            print(out)
        }
        Commands::IsApproved { owner, operator } => {
            let d = load(state)?;
            print(json!({ "approved": d.token().is_approved_for_all(&owner, &operator) }))
        }
        Commands::DeployContract { address, code } => {
            let out = mutate(state, |d| {
                d.token_mut().deploy_contract(&address, code)?;
                Ok(json!({ "address": address, "code": code }))
            })?;
            print(out)
        }
        Commands::TransferAdmin { caller, new_admin } => {
            let out = mutate(state, |d| {
                d.token_mut().transfer_admin(&caller, &new_admin)?;
                Ok(json!({ "admin": new_admin }))
            })?;
            print(out)
        }
        Commands::SetAirdrop { caller, id, amount } => {
            let out = mutate(state, |d| {
                d.set_airdrop(&caller, id, amount)?;
                Ok(json!({ "id": id, "amount_per_claim": d.airdrop().amount_per_claim(id) }))
            })?;
            print(out)
        }
        Commands::Claim { caller, id } => {
            let out = mutate(state, |d| {
                let amount = d.claim(&caller, id)?;
                Ok(json!({
                    "claimant": caller,
                    "id": id,
                    "amount": amount,
                    "airdrop_balance": d.token().balance_of(d.airdrop().address(), id),
                }))
            })?;
            print(out)
        }
        Commands::Claimed { account, id } => {
            let d = load(state)?;
            print(json!({ "account": account, "id": id, "claimed": d.airdrop().has_claimed(&account, id) }))
        }
        Commands::Withdraw {
            caller,
            id,
            amount,
            to,
        } => {
            let out = mutate(state, |d| {
                d.withdraw(&caller, id, amount, &to)?;
                Ok(json!({ "to": to, "id": id, "airdrop_balance": d.token().balance_of(d.airdrop().address(), id) }))
            })?;
            print(out)
        }
        Commands::Snapshot => {
            let d = load(state)?;
            let snapshot = d.token().snapshot();
            print(json!({
                "height": snapshot.meta.height,
                "state_root": snapshot.root_hex(),
                "supply": snapshot.supply,
                "accounts": snapshot.accounts,
            }))
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    run(Cli::parse())
}
