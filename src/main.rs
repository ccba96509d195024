//! sBTC Peg-In CLI
//!
//! Run modes:
//!   pegin balance     - connect, print balances and session details
//!   pegin deposit     - run one peg-in deposit and watch it confirm
//!   pegin help        - show usage

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sbtc_pegin::chain::bitcoin::EsploraClient;
use sbtc_pegin::chain::stacks::StacksClient;
use sbtc_pegin::config::{ConfigError, PeginConfig};
use sbtc_pegin::connect::DevWallet;
use sbtc_pegin::session::{SessionConfig, SessionService, SessionState};
use sbtc_pegin::{logging, report, units, PeginError};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "balance" => run_balance().await,
        "deposit" => run_deposit(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("sBTC Peg-In Client");
    println!();
    println!("Usage:");
    println!("  pegin balance                          Connect and print balances");
    println!("  pegin deposit [--amount <sats>]        Run one peg-in deposit");
    println!("                [--interval <secs>]      Confirmation poll interval");
    println!();
    println!("Environment Variables:");
    println!("  PEGIN_NETWORK        mainnet, testnet, or devnet (default: devnet)");
    println!("  PEGIN_ESPLORA_URL    Esplora API endpoint");
    println!("  PEGIN_STACKS_API     Stacks node API endpoint");
    println!("  PEGIN_SBTC_CONTRACT  sBTC contract identifier (ADDR.name)");
    println!("  PEGIN_STX_ADDRESS    Stacks address receiving sBTC");
    println!("  PEGIN_WALLET_SEED    Seed for the dev wallet's BTC key");
    println!("  PEGIN_DEPOSIT_SATS   Deposit amount (default: 10000)");
}

/// Wire the session service from configuration
fn build_service(config: &PeginConfig) -> Result<SessionService, PeginError> {
    let wallet = Arc::new(DevWallet::from_config(config)?);
    let btc = Arc::new(EsploraClient::new(&config.esplora_url));
    let stacks = Arc::new(
        StacksClient::new(
            &config.stacks_api,
            &config.sbtc_contract,
            &config.sbtc_asset,
            config.network.bitcoin_network(),
        )
        .map_err(|e| {
            ConfigError::InvalidValue("PEGIN_SBTC_CONTRACT".to_string(), e.to_string())
        })?,
    );

    Ok(SessionService::new(
        SessionConfig::from_config(config),
        wallet.clone(),
        wallet,
        btc,
        stacks,
    ))
}

/// Connect and print the session details
async fn run_balance() -> Result<(), PeginError> {
    let config = PeginConfig::from_env()?;
    logging::init_from_config(&config)?;
    config.print_summary();
    println!();

    let mut session = build_service(&config)?;
    session.connect().await?;

    let state = session.state().await;
    println!("{}", report::banner(&state));
    println!();
    println!("{}", report::field_dump(&state));

    session.reset().await;
    Ok(())
}

/// Run one peg-in deposit and watch it confirm
async fn run_deposit(args: &[String]) -> Result<(), PeginError> {
    let mut config = PeginConfig::from_env()?;

    // Parse arguments
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--amount" if i + 1 < args.len() => {
                config.deposit_sats = args[i + 1].parse().unwrap_or(config.deposit_sats);
                i += 2;
            }
            "--interval" if i + 1 < args.len() => {
                config.poll_interval_secs =
                    args[i + 1].parse().unwrap_or(config.poll_interval_secs);
                i += 2;
            }
            _ => i += 1,
        }
    }

    logging::init_from_config(&config)?;
    config.print_summary();
    println!();
    println!(
        "Transfer {} to the peg-in.",
        units::format_sats(config.deposit_sats)
    );
    println!();

    let mut session = build_service(&config)?;
    session.connect().await?;

    let state = session.state().await;
    println!("{}", report::banner(&state));
    println!("{}", report::render(&state, config.network, config.deposit_sats));
    println!();

    match state {
        SessionState::Ready { .. } => {}
        SessionState::InsufficientFunds { .. } => {
            session.reset().await;
            return Ok(());
        }
        other => {
            eprintln!("Cannot deposit from state {}", other.label());
            session.reset().await;
            return Ok(());
        }
    }

    let txid = session.deposit().await?;
    println!("Deposit broadcast: {}", txid);
    println!();

    // Watch the session until the deposit confirms
    let mut last_label = "";
    loop {
        let state = session.state().await;
        if state.label() != last_label {
            println!("{}", report::render(&state, config.network, config.deposit_sats));
            last_label = state.label();
        }

        match state {
            SessionState::Confirmed { .. } => {
                println!();
                println!("{}", report::field_dump(&state));
                break;
            }
            SessionState::Failed { .. } => break,
            _ => {}
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    session.reset().await;
    Ok(())
}
