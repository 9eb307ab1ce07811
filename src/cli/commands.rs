use crate::core::Amount;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// On/off switch for the mining and generator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    Start,
    Stop,
}

#[derive(Debug, Parser)]
#[command(name = "powchain-node")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to the node's TOML config file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a node and serve requests")]
    StartNode {
        #[arg(long, help = "Start mining as soon as the node is up")]
        mine: bool,
        #[arg(long, help = "Start the transaction generator as soon as the node is up")]
        generate: bool,
    },
    #[command(name = "keygen", about = "Create the node key file if missing and print its public key")]
    Keygen,
    #[command(name = "printchain", about = "Print the canonical chain from the local chain file")]
    Printchain,
    #[command(name = "verifychain", about = "Ask a node to verify its block tree")]
    VerifyChain {
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
    #[command(name = "getbalance", about = "Get the balance of a public key")]
    GetBalance {
        #[arg(help = "Hex public key, defaults to the node's own key")]
        pub_key: Option<String>,
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
    #[command(name = "blockcount", about = "Length of a node's canonical chain")]
    BlockCount {
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
    #[command(name = "mine", about = "Start or stop mining on a node")]
    Mine {
        #[arg(value_enum)]
        action: Toggle,
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
    #[command(name = "generator", about = "Start or stop a node's transaction generator")]
    Generator {
        #[arg(value_enum)]
        action: Toggle,
        #[arg(long, help = "Seconds between generated transactions")]
        interval: Option<u64>,
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
    #[command(name = "send", about = "Pay from a node's wallet")]
    Send {
        #[arg(help = "Hex public key of the receiver")]
        to: String,
        #[arg(help = "Amount in coins, up to 3 decimals")]
        amount: Amount,
        #[arg(long, help = "Miner fee, defaults to the configured one")]
        fee: Option<Amount>,
        #[arg(long, help = "Node address, defaults to the configured one")]
        node: Option<String>,
    },
}
