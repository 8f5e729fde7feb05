use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "circuit-cli")]
#[command(about = "Inspect circuits of a running circuit-gate server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Server version and circuit counts
    Status,
    /// Snapshots of every circuit, grouped
    Circuits,
    /// Snapshot of one circuit
    Circuit { group: String, name: String },
    /// Follow the Hystrix stream
    Watch {
        #[arg(long, default_value = "/hystrix")]
        path: String,

        /// Stop after this many records
        #[arg(short, long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let path = match &cli.command {
        Commands::Status => "/admin/status".to_string(),
        Commands::Circuits => "/admin/circuits".to_string(),
        Commands::Circuit { group, name } => format!("/admin/circuits/{}/{}", group, name),
        Commands::Watch { path, count } => {
            let res = client.get(format!("{}{}", cli.url, path)).send().await?;
            return watch(res, *count).await;
        }
    };

    let res = client
        .get(format!("{}{}", cli.url, path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Print one line per record: state, group/name, request and error counts.
async fn watch(mut res: reqwest::Response, count: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status().is_success() {
        eprintln!("Error: stream returned status {}", res.status());
        return Ok(());
    }

    let mut buffer = String::new();
    let mut seen = 0;
    while let Some(chunk) = res.chunk().await? {
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            let Some(data) = frame.trim().strip_prefix("data: ") else {
                continue;
            };
            let record: Value = serde_json::from_str(data)?;
            println!(
                "{:<9} {}/{} requests={} errors={} ({}%)",
                record["circuitState"].as_str().unwrap_or("?"),
                record["group"].as_str().unwrap_or("?"),
                record["name"].as_str().unwrap_or("?"),
                record["requestCount"],
                record["errorCount"],
                record["errorPercentage"],
            );
            seen += 1;
            if count.is_some_and(|limit| seen >= limit) {
                return Ok(());
            }
        }
    }
    Ok(())
}
