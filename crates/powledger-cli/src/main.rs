use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powledger-cli")]
#[command(about = "CLI client for a powledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        #[arg(long)]
        author: String,
        #[arg(long)]
        content: String,
    },
    /// Mine pending transactions into a block
    Mine,
    /// Print the node's chain
    Chain,
    /// Print unconfirmed transactions
    Pending,
    /// Register the node with another node and adopt its chain
    RegisterWith {
        /// Address of the existing node
        address: String,
    },
    /// Ask the node to run consensus against its peers
    Consensus,
}

#[derive(Serialize)]
struct NewTx {
    author: String,
    content: String,
}

#[derive(Serialize)]
struct NodeAddress {
    node_address: String,
}

async fn print_response(res: Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = Client::new();
    debug!(%node, command = ?cli.cmd, "sending request");

    let res = match cli.cmd {
        Command::Submit { author, content } => {
            client
                .post(format!("{node}/new_transaction"))
                .json(&NewTx { author, content })
                .send()
                .await?
        }
        Command::Mine => client.get(format!("{node}/mine")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
        Command::Pending => client.get(format!("{node}/pending_tx")).send().await?,
        Command::RegisterWith { address } => {
            client
                .post(format!("{node}/register_with"))
                .json(&NodeAddress {
                    node_address: address,
                })
                .send()
                .await?
        }
        Command::Consensus => client.get(format!("{node}/consensus")).send().await?,
    };
    print_response(res).await
}
