mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{FeeClient, DEFAULT_NODE_URL};
use colored::Colorize;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "tierfee-cli")]
#[command(about = "Query the tiered fee market of a node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Node API URL
    #[arg(long, global = true, default_value = DEFAULT_NODE_URL)]
    node: String,

    /// Print raw JSON instead of a table
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read-only queries
    #[command(subcommand)]
    Query(QueryCommands),
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Show the tier configuration
    Params,

    /// Show the current gas price of every tier
    GasPrices,

    /// Show the current gas price of one tier
    GasPrice {
        /// Tier index
        tier: u32,
    },

    /// Show the gas consumed by the last committed block
    BlockGasUsed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = FeeClient::new(Some(cli.node.clone()));

    let Commands::Query(query) = cli.command;
    match query {
        QueryCommands::Params => {
            let resp = client.params()?;
            if cli.json {
                return print_json(&resp);
            }
            println!("\n{}", "Fee Tiers".cyan().bold());
            println!("{}", "=".repeat(50).cyan());
            for (index, tier) in resp.params.tiers.iter().enumerate() {
                println!("{} {}", "Tier".bright_white(), index.to_string().green());
                println!("  {}: {}", "Priority".bright_white(), tier.priority);
                println!("  {}: {}", "Initial Gas Price".bright_white(), tier.initial_gas_price);
                println!("  {}: {}", "Parent Gas Target".bright_white(), tier.parent_gas_target);
                println!("  {}: {}", "Change Denominator".bright_white(), tier.change_denominator);
                if let Some(min) = &tier.min_gas_price {
                    println!("  {}: {}", "Min Gas Price".bright_white(), min);
                }
                if let Some(max) = &tier.max_gas_price {
                    println!("  {}: {}", "Max Gas Price".bright_white(), max);
                }
            }
        }

        QueryCommands::GasPrices => {
            let resp = client.gas_prices()?;
            if cli.json {
                return print_json(&resp);
            }
            println!("\n{}", "Gas Prices".cyan().bold());
            println!("{}", "─".repeat(50).bright_black());
            for (index, price) in resp.gas_prices.iter().enumerate() {
                println!("{} {}: {}", "Tier".bright_white(), index, price.to_string().yellow());
            }
        }

        QueryCommands::GasPrice { tier } => {
            let resp = client.gas_price(tier)?;
            if cli.json {
                return print_json(&resp);
            }
            println!("{} {}: {}", "Tier".bright_white(), tier, resp.gas_price.to_string().yellow());
        }

        QueryCommands::BlockGasUsed => {
            let resp = client.block_gas_used()?;
            if cli.json {
                return print_json(&resp);
            }
            println!(
                "{}: {}",
                "Block Gas Used".bright_white(),
                resp.block_gas_used.to_string().green()
            );
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
