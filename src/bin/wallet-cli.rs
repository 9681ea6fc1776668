use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "wallet-cli")]
#[command(about = "Command-line client for the custody wallet API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// Show the sender address and balance
    Info,
    /// Send STX to a recipient
    Send {
        /// Recipient address (or address.contract-name)
        recipient: String,
        /// Amount in STX, e.g. 1.5
        amount: String,
        /// Optional memo (at most 34 bytes)
        #[arg(short, long)]
        memo: Option<String>,
    },
    /// Sign a hex message with the custodial key
    Sign {
        /// Hex-encoded message
        message: String,
    },
    /// Request testnet funds for the sender
    Faucet,
    /// Show the tracked status of a transaction
    Status {
        /// Transaction id (hex)
        txid: String,
    },
    /// List wallets known to the signer
    Wallets,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Info => client.get(format!("{}/wallet-info", base)).send().await?,
        Commands::Send {
            recipient,
            amount,
            memo,
        } => {
            client
                .post(format!("{}/send", base))
                .json(&json!({ "recipient": recipient, "amount": amount, "memo": memo }))
                .send()
                .await?
        }
        Commands::Sign { message } => {
            client
                .post(format!("{}/sign", base))
                .json(&json!({ "message": message }))
                .send()
                .await?
        }
        Commands::Faucet => client.post(format!("{}/faucet", base)).send().await?,
        Commands::Status { txid } => {
            client
                .get(format!("{}/transactions/{}", base, txid))
                .send()
                .await?
        }
        Commands::Wallets => client.get(format!("{}/wallets", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
    } else {
        eprintln!("Error: wallet API returned status {}", status);
        eprintln!("{}", rendered);
    }
    Ok(())
}
