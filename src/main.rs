// Entry point for the node binary: starts a node or talks to a running one
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use powchain_node::cli::Toggle;
use powchain_node::{
    send_request, Blockchain, Command, Config, Identity, KeyPairIdentity, Node, Opt, Package,
    PublicKey, Response, Server,
};
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default, RUST_LOG overrides it
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(opt.config.as_deref())?;
    let remote = |node: Option<String>| node.unwrap_or_else(|| config.node.address.clone());

    match opt.command {
        Command::StartNode { mine, generate } => {
            let node = Arc::new(Node::from_config(&config)?);
            println!(
                "Node {} up at {} with key {}",
                config.extract_node_id_from_addr(),
                config.node.address,
                node.wallet().own_public_key()
            );
            if mine || config.mining.autostart {
                node.start_mining();
            }
            if generate || config.generator.autostart {
                node.start_generator(None)?;
            }
            info!("Listening on {}", config.node.address);
            Server::new(node).run(&config.node.address)?;
        }
        Command::Keygen => {
            let path = config.key_file();
            let identity = KeyPairIdentity::load_or_generate(&path)?;
            println!("Key file: {}", path.display());
            println!("Public key: {}", identity.own_public_key());
        }
        Command::Printchain => {
            let blockchain = Blockchain::open(
                &config.node.data_dir,
                config.mining.difficulty_bits,
                &config.genesis.allocations,
            )?;
            if let Some(path) = blockchain.chain_path() {
                info!("Reading {}", path.display());
            }
            for block in blockchain.canonical_chain()? {
                println!("{}", serde_json::to_string_pretty(&block.to_display_record())?);
            }
        }
        Command::VerifyChain { node } => {
            print_response(send_request(&remote(node), &Package::VerifyBlockchain)?)?;
        }
        Command::GetBalance { pub_key, node } => {
            let package = Package::GetBalance {
                pub_key: pub_key.map(PublicKey::from),
            };
            print_response(send_request(&remote(node), &package)?)?;
        }
        Command::BlockCount { node } => {
            print_response(send_request(&remote(node), &Package::GetBlockCount)?)?;
        }
        Command::Mine { action, node } => {
            let package = match action {
                Toggle::Start => Package::StartMining,
                Toggle::Stop => Package::StopMining,
            };
            print_response(send_request(&remote(node), &package)?)?;
        }
        Command::Generator {
            action,
            interval,
            node,
        } => {
            let package = match action {
                Toggle::Start => Package::StartGenerator {
                    interval_secs: interval,
                },
                Toggle::Stop => Package::StopGenerator,
            };
            print_response(send_request(&remote(node), &package)?)?;
        }
        Command::Send {
            to,
            amount,
            fee,
            node,
        } => {
            let package = Package::Send {
                to: PublicKey::from(to),
                amount,
                fee,
            };
            print_response(send_request(&remote(node), &package)?)?;
        }
    }
    Ok(())
}

// A rejection is an error for the exit code
fn print_response(response: Response) -> Result<(), Box<dyn std::error::Error>> {
    match response {
        Response::Ack {
            accepted: false,
            reason,
        } => Err(reason.unwrap_or_else(|| "request rejected".to_string()).into()),
        Response::Count { count } => {
            println!("{count}");
            Ok(())
        }
        Response::Balance { current_balance } => {
            println!("{current_balance}");
            Ok(())
        }
        Response::Verified { verified } => {
            println!("{verified}");
            if verified {
                Ok(())
            } else {
                Err("block tree failed verification".into())
            }
        }
        Response::Submitted { id } => {
            println!("Submitted transaction {id}");
            Ok(())
        }
        Response::Ack { .. } => {
            println!("OK");
            Ok(())
        }
        Response::Status { message } => {
            println!("{message}");
            Ok(())
        }
    }
}
