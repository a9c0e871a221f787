use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use homekit_bridge::accessory::AccessoryRegistry;
use homekit_bridge::console::{self, ConsoleCommand};
use homekit_bridge::{
    AuthGate, AuthRefresh, Bridge, BridgeIdentity, Config, HapAdvertiser, PairingStore,
    SqlitePairingStore, db,
};

/// Configuration number advertised in the `c#` TXT record
const CONFIG_NUMBER: u32 = 1;

/// hkbridge - HomeKit accessory bridge management
#[derive(Parser)]
#[command(name = "hkbridge", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove all pairings with HomeKit clients
    ClearPairings,
    /// List paired controllers
    Pairings,
    /// List all accessories
    List,
    /// Print accessories matching an id or name
    Show {
        /// Accessory id or (partial) name
        query: String,
    },
    /// Show the bridge device id and setup code
    Identity,
    /// Read console commands from stdin against a live bridge
    Console {
        /// Do not publish the bridge over mDNS
        #[arg(long)]
        no_advertise: bool,
    },
}

/// Refresh target used when nothing is advertised
struct NoProtocol;

#[async_trait]
impl AuthRefresh for NoProtocol {
    async fn refresh_auth_info(&self) {
        tracing::debug!("no protocol layer running, auth refresh skipped");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,homekit_bridge=info",
        1 => "info,homekit_bridge=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::ClearPairings => {
            let bridge = build_bridge(&config)?;
            run_console(&bridge, &ConsoleCommand::ClearPairings).await
        }
        Command::Pairings => cmd_pairings(&config),
        Command::List => {
            let bridge = build_bridge(&config)?;
            run_console(&bridge, &ConsoleCommand::List { legacy: false }).await
        }
        Command::Show { query } => {
            let bridge = build_bridge(&config)?;
            let command = ConsoleCommand::Show {
                query: Some(query),
                legacy: false,
            };
            run_console(&bridge, &command).await
        }
        Command::Identity => cmd_identity(&config),
        Command::Console { no_advertise } => {
            cmd_console(&config, !no_advertise && config.advertise).await
        }
    }
}

/// Open the pairing store and assemble a bridge around it
fn build_bridge(config: &Config) -> anyhow::Result<Bridge> {
    let store = open_store(config)?;
    Ok(assemble(config, store, Arc::new(NoProtocol)))
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PairingStore>> {
    let pool = db::init(config.db_path())?;
    Ok(Arc::new(SqlitePairingStore::new(pool)))
}

fn assemble(
    config: &Config,
    store: Arc<dyn PairingStore>,
    protocol: Arc<dyn AuthRefresh>,
) -> Bridge {
    let registry = AccessoryRegistry::new(config.name_timeout);
    for accessory in &config.accessories {
        registry.register(accessory.to_accessory());
    }
    tracing::debug!(accessories = registry.len(), "accessory registry loaded");

    Bridge::new(
        store,
        Arc::new(registry),
        Arc::new(AuthGate::new(config.allow_unauthenticated)),
        protocol,
    )
}

async fn run_console(bridge: &Bridge, command: &ConsoleCommand) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    console::execute(bridge, command, &mut out).await?;
    Ok(())
}

fn cmd_pairings(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let pairings = store.list()?;

    if pairings.is_empty() {
        println!("No paired controllers");
        return Ok(());
    }

    for record in pairings {
        let role = if record.admin { "admin" } else { "user" };
        println!(
            "{} ({role}) paired {}",
            record.controller_id,
            record.paired_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

fn cmd_identity(config: &Config) -> anyhow::Result<()> {
    let identity = BridgeIdentity::load_or_create(&config.identity_path(), &config.bridge_name)?;
    println!("Name:       {}", identity.name);
    println!("Device ID:  {}", identity.device_id);
    println!("Setup code: {}", identity.setup_code);
    Ok(())
}

async fn cmd_console(config: &Config, advertise: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let advertiser = if advertise {
        let identity =
            BridgeIdentity::load_or_create(&config.identity_path(), &config.bridge_name)?;
        let advertiser = Arc::new(HapAdvertiser::new(
            identity,
            config.port,
            CONFIG_NUMBER,
            Arc::clone(&store),
        )?);
        if let Err(e) = advertiser.start().await {
            tracing::warn!(error = %e, "failed to start mDNS advertisement");
        }
        Some(advertiser)
    } else {
        None
    };

    let protocol: Arc<dyn AuthRefresh> = match &advertiser {
        Some(advertiser) => Arc::clone(advertiser) as Arc<dyn AuthRefresh>,
        None => Arc::new(NoProtocol),
    };
    let bridge = assemble(config, store, protocol);

    tracing::info!(
        accessories = bridge.accessory_count(),
        advertise,
        "bridge console ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut args: Vec<&str> = line.split_whitespace().collect();
        if args.first() == Some(&console::COMMAND) {
            args.remove(0);
        }
        match args.first() {
            Some(&("exit" | "quit")) => break,
            None => continue,
            Some(_) => run_console(&bridge, &ConsoleCommand::parse(&args)).await?,
        }
    }

    if let Some(advertiser) = advertiser {
        advertiser.stop().await;
    }
    Ok(())
}
