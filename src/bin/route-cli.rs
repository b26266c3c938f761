use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Management CLI for route-reloader", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key, if the server requires one.
    #[arg(short, long, env = "ROUTE_RELOADER_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the published generation and reload state
    Status,
    /// Check that the admin API answers
    Ping {
        #[arg(long)]
        name: Option<String>,
    },
    /// List routes of the published generation in priority order
    Routes,
    /// Dry-run a request against the published routes
    Match {
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Push a JSON array of change events
    Push {
        file: PathBuf,
        /// Wait for the batch to be applied and print the outcome
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Ping { name } => {
            let mut request = client.get(format!("{}/admin/ping", cli.url));
            if let Some(name) = name {
                request = request.query(&[("name", name)]);
            }
            request.headers(headers).send().await?
        }
        Commands::Routes => {
            client
                .get(format!("{}/admin/routes", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Match { path, method, host } => {
            let mut query = vec![("path", path), ("method", method)];
            if let Some(host) = host {
                query.push(("host", host));
            }
            client
                .get(format!("{}/admin/match", cli.url))
                .query(&query)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Push { file, wait } => {
            let events: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            client
                .post(format!("{}/admin/changes", cli.url))
                .query(&[("wait", wait)])
                .headers(headers)
                .json(&events)
                .send()
                .await?
        }
    };

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
