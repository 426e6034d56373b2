use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "interceptor-cli")]
#[command(about = "Probe CLI for the HTTP interceptor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request to a path and print the answer
    Get { path: String },
    /// Open a websocket on a path, send one message and print the reply
    Echo { path: String, message: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Get { path } => {
            let res = reqwest::get(format!("{}{}", base, path)).await?;
            print_response(res).await?;
        }
        Commands::Echo { path, message } => {
            let ws_base = base
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1);
            let (mut ws, _) = tokio_tungstenite::connect_async(format!("{}{}", ws_base, path)).await?;

            ws.send(Message::text(message)).await?;
            match ws.next().await {
                Some(Ok(reply)) => println!("{}", reply),
                Some(Err(e)) => return Err(e.into()),
                None => eprintln!("Connection closed without a reply"),
            }
            ws.close(None).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
