use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Control CLI for the message relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show listener state
    Status,
    /// Start the TCP and UDP listeners
    Start,
    /// Stop the listeners and close active connections
    Stop,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Status => {
            client.get(format!("{}/status", cli.url))
                .send()
                .await?
        }
        Commands::Start => {
            client.post(format!("{}/start", cli.url))
                .send()
                .await?
        }
        Commands::Stop => {
            client.post(format!("{}/stop", cli.url))
                .send()
                .await?
        }
    };
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;

    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }

    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        std::process::exit(1);
    }
    Ok(())
}
