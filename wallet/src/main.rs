use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use seedvault_wallet::{Account, RpcClient, Wallet, WalletConfig, WalletState};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wallet")]
#[command(about = "Seed phrase wallet for Ethereum compatible chains")]
struct Cli {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wallet store path
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// RPC URL
    #[arg(short, long, env = "SEEDVAULT_RPC_URL")]
    rpc: Option<String>,

    /// Chain ID
    #[arg(long)]
    chain_id: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show wallet state and configuration
    Status,

    /// Create a new wallet
    Create,

    /// List accounts with balances
    Accounts,

    /// Derive the next account
    Add,

    /// Send ether
    Send {
        /// From account index
        #[arg(short, long, default_value = "0")]
        from: u32,

        /// To address
        #[arg(short, long)]
        to: String,

        /// Amount in ether
        #[arg(short, long)]
        amount: String,
    },

    /// Show the seed phrase
    ShowSeed,

    /// Export an account's private key
    Export {
        /// Account index
        index: u32,
    },

    /// Delete the wallet from this machine
    Reset,

    /// Interactive mode
    Interactive,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let mut config = WalletConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(rpc) = cli.rpc {
        config.rpc_url = rpc;
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }

    let wallet = Wallet::open(config)?;

    match cli.command {
        Commands::Status => show_status(&wallet).await?,
        Commands::Create => create_wallet(&wallet).await?,
        Commands::Accounts => {
            unlock(&wallet).await?;
            list_accounts(&wallet).await?;
        }
        Commands::Add => {
            unlock(&wallet).await?;
            add_account(&wallet).await?;
        }
        Commands::Send { from, to, amount } => {
            unlock(&wallet).await?;
            send_transaction(&wallet, from, &to, &amount).await?;
        }
        Commands::ShowSeed => {
            unlock(&wallet).await?;
            show_seed(&wallet).await?;
        }
        Commands::Export { index } => {
            unlock(&wallet).await?;
            export_key(&wallet, index).await?;
        }
        Commands::Reset => reset_wallet(&wallet).await?,
        Commands::Interactive => interactive_mode(&wallet).await?,
    }

    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn show_status(wallet: &Wallet) -> Result<()> {
    let config = wallet.config();
    let state = match wallet.state().await {
        WalletState::Uninitialized => "not created".yellow(),
        WalletState::Locked => "locked".bright_green(),
        WalletState::Unlocked => "unlocked".bright_green(),
    };

    println!("{}", "Wallet Information:".bright_cyan());
    println!("  State:    {}", state);
    println!("  Store:    {:?}", config.store_path);
    println!("  RPC URL:  {}", config.rpc_url);
    println!("  Chain ID: {}", config.chain_id);

    let client = RpcClient::new(&config.rpc_url, config.rpc_timeout())?;
    match client.get_chain_id().await {
        Ok(node_chain_id) if node_chain_id == config.chain_id => {
            println!("  Node:     {}", "connected".bright_green());
        }
        Ok(node_chain_id) => {
            println!(
                "  Node:     {}",
                format!("chain id {} does not match config", node_chain_id).yellow()
            );
        }
        Err(e) => println!("  Node:     {}", format!("unreachable ({})", e).red()),
    }

    Ok(())
}

async fn unlock(wallet: &Wallet) -> Result<()> {
    if wallet.state().await == WalletState::Uninitialized {
        anyhow::bail!("No wallet found. Create one with 'wallet create'");
    }

    let password = Password::new()
        .with_prompt("Enter password to unlock wallet")
        .interact()?;

    let pb = spinner("Unlocking wallet...")?;
    let result = wallet.unlock(&password).await;
    pb.finish_and_clear();

    result?;
    Ok(())
}

async fn create_wallet(wallet: &Wallet) -> Result<()> {
    println!("{}", "Creating new wallet...".bright_cyan());

    let password = Password::new()
        .with_prompt("Enter password for new wallet")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let pb = spinner("Encrypting seed phrase...")?;
    let result = wallet.create(&password).await;
    pb.finish_and_clear();
    let accounts = result?;

    println!("{}", "✓ Wallet created successfully!".green());
    if let Some(account) = accounts.first() {
        println!("  Address: {}", account.address);
    }
    println!();

    show_seed(wallet).await?;

    let saved = Confirm::new()
        .with_prompt("Have you written down your seed phrase?")
        .default(false)
        .interact()?;
    if saved {
        wallet.confirm_seed_backup().await?;
    } else {
        println!("{}", "⚠ Run 'wallet show-seed' to back it up later".yellow());
    }

    Ok(())
}

fn print_account(account: &Account) {
    println!("  [{}] {}", account.index, account.address);
    println!("      Balance: {} ETH", account.balance.to_string().bright_green());
}

async fn list_accounts(wallet: &Wallet) -> Result<()> {
    let accounts = if wallet.config().refresh_balances_on_unlock {
        wallet.accounts().await
    } else {
        let pb = spinner("Fetching balances...")?;
        let result = wallet.load_accounts().await;
        pb.finish_and_clear();
        result?
    };

    println!("{}", "Accounts:".bright_cyan());
    println!("{}", "─".repeat(60));

    for account in &accounts {
        print_account(account);
    }

    if !wallet.seed_backup_confirmed().await? {
        println!();
        println!("{}", "⚠ Seed phrase not backed up yet. Run 'wallet show-seed'".yellow());
    }

    Ok(())
}

async fn add_account(wallet: &Wallet) -> Result<()> {
    let pb = spinner("Deriving account...")?;
    let result = wallet.add_account().await;
    pb.finish_and_clear();
    let account = result?;

    println!("{}", "✓ Account added".green());
    print_account(&account);
    Ok(())
}

async fn send_transaction(wallet: &Wallet, from: u32, to: &str, amount: &str) -> Result<()> {
    println!("{}", "Transaction Details:".bright_cyan());
    println!("  From:   Account #{}", from);
    println!("  To:     {}", to);
    println!("  Amount: {} ETH", amount);

    println!();
    let confirm = Confirm::new()
        .with_prompt("Send transaction?")
        .default(false)
        .interact()?;

    if !confirm {
        println!("{}", "Transaction cancelled".yellow());
        return Ok(());
    }

    let pb = spinner("Sending transaction...")?;
    let result = wallet.send(from, to, amount).await;
    pb.finish_and_clear();

    match (result.success, result.hash) {
        (true, Some(hash)) => {
            println!("{}", "✓ Transaction sent successfully!".green());
            println!("  Hash: {}", hash);
            wallet.refresh_balances().await?;
        }
        _ => {
            let error = result.error.unwrap_or_else(|| "unknown error".to_string());
            println!("{} {}", "✗ Transaction failed:".red(), error);
        }
    }

    Ok(())
}

async fn show_seed(wallet: &Wallet) -> Result<()> {
    println!("{}", "⚠ WARNING: Anyone with this phrase controls your funds!".bright_red());

    let phrase = wallet.reveal_seed_phrase().await?;
    println!("{}", "Seed phrase:".bright_cyan());
    for (i, word) in phrase.split_whitespace().enumerate() {
        println!("  {:>2}. {}", i + 1, word.bright_yellow());
    }
    println!();

    Ok(())
}

async fn export_key(wallet: &Wallet, index: u32) -> Result<()> {
    println!("{}", "⚠ WARNING: Never share your private key!".bright_red());

    let private_key = wallet.export_private_key(index).await?;

    println!("{}", "Private key:".bright_cyan());
    println!("  {}", private_key.as_str().bright_yellow());

    Ok(())
}

async fn reset_wallet(wallet: &Wallet) -> Result<()> {
    println!(
        "{}",
        "⚠ This permanently deletes the encrypted seed from this machine.".bright_red()
    );

    let confirm = Confirm::new()
        .with_prompt("Reset wallet? Funds are only recoverable with your seed phrase")
        .default(false)
        .interact()?;

    if !confirm {
        println!("{}", "Reset cancelled".yellow());
        return Ok(());
    }

    wallet.reset().await?;
    println!("{}", "✓ Wallet reset".green());
    Ok(())
}

async fn interactive_mode(wallet: &Wallet) -> Result<()> {
    println!("{}", "Seedvault Wallet - Interactive Mode".bright_cyan().bold());
    println!("{}", "─".repeat(50));

    loop {
        let state = wallet.state().await;
        let options: &[&str] = match state {
            WalletState::Uninitialized => &["Create wallet", "Exit"],
            WalletState::Locked => &["Unlock", "Reset wallet", "Exit"],
            WalletState::Unlocked => &[
                "List accounts",
                "Add account",
                "Send transaction",
                "Show seed phrase",
                "Export private key",
                "Lock",
                "Reset wallet",
                "Exit",
            ],
        };

        let selection = Select::new()
            .with_prompt("Select an option")
            .items(options)
            .default(0)
            .interact()?;

        let outcome = match options[selection] {
            "Create wallet" => create_wallet(wallet).await,
            "Unlock" => unlock(wallet).await,
            "List accounts" => list_accounts(wallet).await,
            "Add account" => add_account(wallet).await,
            "Send transaction" => {
                let from = Input::<u32>::new()
                    .with_prompt("From account index")
                    .default(0)
                    .interact()?;
                let to = Input::<String>::new()
                    .with_prompt("To address (0x...)")
                    .interact()?;
                let amount = Input::<String>::new()
                    .with_prompt("Amount in ETH")
                    .interact()?;
                send_transaction(wallet, from, &to, &amount).await
            }
            "Show seed phrase" => show_seed(wallet).await,
            "Export private key" => {
                let index = Input::<u32>::new().with_prompt("Account index").interact()?;
                export_key(wallet, index).await
            }
            "Lock" => {
                wallet.lock().await;
                println!("{}", "✓ Wallet locked".green());
                Ok(())
            }
            "Reset wallet" => reset_wallet(wallet).await,
            _ => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
        };

        // Keep the session alive after a failed operation
        if let Err(e) = outcome {
            println!("{} {}", "✗".red(), e);
        }
        println!();
    }

    Ok(())
}
