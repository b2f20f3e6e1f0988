//! OFT Transfer CLI
//!
//! ```text
//! oft-transfer send --contract-address 0x... --recipient 0x... \
//!     --source-network base-sepolia --destination-network coredao-testnet --amount 1.5
//! oft-transfer networks
//! oft-transfer paths [--oapp 0x...]
//! ```
//!
//! Configuration comes from `.env` and the environment (see `config`). Any transfer that ends
//! in `Failed` exits non-zero.

use std::time::Duration;

use alloy::primitives::{utils::format_ether, Address};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

use oft_transfer::config::{Config, SigningCredential};
use oft_transfer::types::{parse_evm_address, parse_recipient};
use oft_transfer::{AlloyConnector, SendCommand, TransferOrchestrator};

#[derive(Parser)]
#[command(name = "oft-transfer")]
#[command(about = "Send OFT tokens between chains over LayerZero V2", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send tokens from one network to another
    Send {
        /// OFT contract on the source network
        #[arg(long)]
        contract_address: String,

        /// Recipient on the destination network (20-byte or 32-byte hex)
        #[arg(long)]
        recipient: String,

        #[arg(long)]
        source_network: String,

        #[arg(long)]
        destination_network: String,

        /// Amount in whole tokens, e.g. "1.5"
        #[arg(long)]
        amount: String,

        /// Signing key; overrides PRIVATE_KEY / MNEMONIC
        #[arg(long)]
        private_key: Option<String>,

        #[arg(long)]
        slippage_bps: Option<u32>,

        /// Destination lzReceive gas
        #[arg(long)]
        execution_gas: Option<u128>,

        #[arg(long)]
        gas_limit: Option<u64>,

        /// Abandon the whole pipeline after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// List known networks
    Networks,

    /// Show security path configuration
    Paths {
        /// Also print provisioning calldata for this OApp
        #[arg(long)]
        oapp: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,oft_transfer=debug"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Send {
            contract_address,
            recipient,
            source_network,
            destination_network,
            amount,
            private_key,
            slippage_bps,
            execution_gas,
            gas_limit,
            deadline_secs,
        } => {
            let command = SendCommand {
                token: parse_evm_address(&contract_address)?,
                recipient: parse_recipient(&recipient)?,
                source_network,
                destination_network,
                amount,
                slippage_bps,
                execution_gas,
                gas_limit,
                deadline: deadline_secs.map(Duration::from_secs),
            };

            let credential = private_key
                .map(SigningCredential::PrivateKey)
                .or_else(|| config.credential.clone())
                .ok_or_else(|| {
                    eyre!("No signing credential: set PRIVATE_KEY or MNEMONIC, or pass --private-key")
                })?;

            run_send(&config, &credential, command).await
        }
        Commands::Networks => {
            print_networks(&config);
            Ok(())
        }
        Commands::Paths { oapp } => {
            let oapp = oapp.as_deref().map(parse_evm_address).transpose()?;
            print_paths(&config, oapp);
            Ok(())
        }
    }
}

async fn run_send(
    config: &Config,
    credential: &SigningCredential,
    command: SendCommand,
) -> Result<()> {
    let signer = credential
        .to_signer()
        .wrap_err("Failed to build signer")?;
    let connector = AlloyConnector::new(signer, config.settings.receipt_poll_interval);
    info!(sender = %connector.address(), credential = %credential, "Signer ready");

    let orchestrator =
        TransferOrchestrator::new(&config.endpoints, &config.paths, &config.settings, &connector);

    match orchestrator.execute(&command).await {
        Ok(receipt) => {
            println!(
                "Estimated fee: {} (native), sent with budget {}",
                format_ether(receipt.quote.native_fee),
                format_ether(receipt.bounds.fee_budget)
            );
            println!("Transaction: {}", receipt.tx_hash());
            println!("Track delivery: {}", receipt.explorer_url);
            Ok(())
        }
        Err(failure) => {
            if let Some(quote) = failure.quote {
                println!("Estimated fee: {} (native)", format_ether(quote.native_fee));
            }
            if let Some(hash) = failure.tx_hash() {
                println!("Transaction: {}", hash);
            }
            if let Some(url) = &failure.explorer_url {
                println!("Track delivery: {}", url);
            }
            if failure.error.is_transient() {
                println!("The network was unreachable; retrying the whole command may succeed");
            }
            Err(failure.into())
        }
    }
}

fn print_networks(config: &Config) {
    println!("{:<20} {:>8} {:>10}  RPC", "NETWORK", "EID", "CHAIN ID");
    for endpoint in config.endpoints.iter() {
        let chain_id = endpoint
            .chain_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let rpc = if endpoint.has_rpc() {
            endpoint.rpc_url.as_str()
        } else {
            "<not configured>"
        };
        println!(
            "{:<20} {:>8} {:>10}  {}",
            endpoint.network_name, endpoint.id, chain_id, rpc
        );
    }
}

fn print_paths(config: &Config, oapp: Option<Address>) {
    let name = |eid| {
        config
            .endpoints
            .get(eid)
            .map(|e| e.network_name.clone())
            .unwrap_or_else(|| format!("eid {}", eid))
    };

    for path in config.paths.iter() {
        let params = path.params();
        let quorum = path.effective_quorum();

        println!("{} -> {}", name(path.from()), name(path.to()));
        println!("  send library:     {}", params.send_library);
        println!(
            "  receive library:  {} (grace {} blocks)",
            params.receive_library, params.receive_library_grace_period
        );
        println!(
            "  confirmations:    send {} / receive {}",
            params.send_confirmations, params.receive_confirmations
        );
        println!(
            "  verifiers:        {} required, {} of {} optional",
            quorum.required_count, quorum.optional_threshold, quorum.optional_count
        );
        for dvn in &params.required_verifiers {
            println!("    required {}", dvn);
        }
        for dvn in &params.optional_verifiers {
            println!("    optional {}", dvn);
        }
        println!(
            "  executor:         {} (max message {} bytes)",
            params.executor, params.max_message_size
        );
        if params.enforced_execution_gas > 0 {
            println!("  enforced gas:     {}", params.enforced_execution_gas);
        }

        if let Some(oapp) = oapp {
            for call in path.provisioning_calls(oapp) {
                println!("  {}: {}", call.description, call.calldata);
            }
        }
        println!();
    }
}
