// Tiered fee market node: genesis management, block simulation and the
// read-only query API over a RocksDB data directory

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tierfee::config::NodeConfig;
use tierfee::storage::{CacheStore, RocksStore};
use tierfee::{BlockGasMeter, GenesisState, Keeper};

#[derive(Parser)]
#[command(name = "tierfeed")]
#[command(about = "Tiered fee market node", long_about = None)]
struct Cli {
    /// Path to config.json (default: $HOME/.tierfee/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a genesis file into the data directory
    Init {
        /// Genesis JSON (default: config genesis_file, else the default genesis)
        #[arg(short, long)]
        genesis: Option<PathBuf>,
    },
    /// Print the current state as genesis JSON
    Export,
    /// Check a genesis file without touching the data directory
    ValidateGenesis {
        file: PathBuf,
    },
    /// Serve the query API
    Serve,
    /// Run one block per gas value and print the resulting prices
    Simulate {
        /// Comma-separated gas consumed by each simulated block
        #[arg(long, value_delimiter = ',', required = true)]
        gas_used: Vec<u64>,
        /// Height of the first simulated block
        #[arg(long, default_value = "1")]
        start_height: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    match cli.command {
        Commands::Init { genesis } => init(&config, genesis)?,
        Commands::Export => export(&config)?,
        Commands::ValidateGenesis { file } => validate_genesis(file)?,
        Commands::Serve => serve(&config).await?,
        Commands::Simulate {
            gas_used,
            start_height,
        } => simulate(&config, &gas_used, start_height)?,
    }
    Ok(())
}

fn open_store(config: &NodeConfig) -> Result<RocksStore> {
    RocksStore::open(&config.home).with_context(|| format!("opening data directory {}", config.home))
}

fn init(config: &NodeConfig, genesis: Option<PathBuf>) -> Result<()> {
    let source = genesis.or_else(|| config.genesis_file.as_ref().map(PathBuf::from));
    let genesis = match &source {
        Some(path) => GenesisState::from_file(path)?,
        None => GenesisState::default(),
    };

    let mut keeper = Keeper::new(CacheStore::new(open_store(config)?));
    keeper.init_genesis(&genesis)?;
    keeper.store().commit()?;
    info!(
        "initialized {} from {}",
        config.home,
        source.map_or_else(|| "default genesis".to_string(), |p| p.display().to_string())
    );
    Ok(())
}

fn export(config: &NodeConfig) -> Result<()> {
    let keeper = Keeper::new(open_store(config)?);
    let genesis = keeper.export_genesis()?;
    println!("{}", serde_json::to_string_pretty(&genesis)?);
    Ok(())
}

fn validate_genesis(file: PathBuf) -> Result<()> {
    let genesis = GenesisState::from_file(&file)?;
    genesis
        .validate()
        .with_context(|| format!("genesis file {} is invalid", file.display()))?;
    println!("genesis file {} is valid ({} tier(s))", file.display(), genesis.params.num_tiers());
    Ok(())
}

async fn serve(config: &NodeConfig) -> Result<()> {
    let addr = config.api_socket_addr()?;
    let keeper = Arc::new(Keeper::new(open_store(config)?));
    tierfee::api::serve(keeper, addr).await
}

fn simulate(config: &NodeConfig, gas_used: &[u64], start_height: u64) -> Result<()> {
    let mut keeper = Keeper::new(CacheStore::new(open_store(config)?));

    for (offset, &gas) in gas_used.iter().enumerate() {
        let height = start_height + offset as u64;

        if let Err(e) = keeper.begin_block(height) {
            keeper.store().discard();
            error!("block {} aborted, nothing committed", height);
            bail!("begin_block at height {}: {}", height, e);
        }
        let prices = keeper.get_all_gas_prices()?;
        keeper.end_block(&BlockGasMeter::with_consumed(gas))?;
        keeper.store().commit()?;

        for (tier, price) in prices.iter().enumerate() {
            println!("height {} tier {} gas_price {}", height, tier, price);
        }
        println!("height {} gas_used {}", height, gas);
    }
    Ok(())
}
