use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mfe-cli")]
#[command(about = "Management CLI for the micro-frontend dispatcher", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "MFE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dispatcher status and page service lifecycles
    Status,
    /// List router rules in priority order
    Routes,
    /// Forward a path pattern to a compute target
    AddRoute {
        name: String,
        path_pattern: String,
        priority: u32,
        target_url: String,
    },
    /// Remove a router rule
    RemoveRoute { name: String },
    /// List registry parameters, or show one
    Params { name: Option<String> },
    /// Write a registry parameter
    SetParam {
        name: String,
        value: String,
        /// Replace a value written in the current generation
        #[arg(long)]
        overwrite: bool,
    },
    /// Upload a file into the shared asset store
    Upload {
        key: String,
        file: PathBuf,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Drop edge cache entries matching a path pattern
    Invalidate { pattern: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Routes => client.get(format!("{}/admin/routes", base)),
        Commands::AddRoute {
            name,
            path_pattern,
            priority,
            target_url,
        } => client.post(format!("{}/admin/routes", base)).json(&json!({
            "name": name,
            "path_pattern": path_pattern,
            "priority": priority,
            "target_url": target_url,
        })),
        Commands::RemoveRoute { name } => client.delete(format!("{}/admin/routes/{}", base, name)),
        Commands::Params { name: None } => client.get(format!("{}/admin/parameters", base)),
        Commands::Params { name: Some(name) } => {
            client.get(format!("{}/admin/parameters/{}", base, name))
        }
        Commands::SetParam {
            name,
            value,
            overwrite,
        } => client
            .put(format!("{}/admin/parameters/{}", base, name))
            .json(&json!({ "value": value, "overwrite": overwrite })),
        Commands::Upload { key, file, owner } => {
            let bytes = tokio::fs::read(&file).await?;
            let mut request = client
                .put(format!("{}/admin/assets/{}", base, key.trim_start_matches('/')))
                .body(bytes);
            if let Some(owner) = owner {
                request = request.header("x-asset-owner", owner);
            }
            request
        }
        Commands::Invalidate { pattern } => client
            .post(format!("{}/admin/cache/invalidate", base))
            .json(&json!({ "pattern": pattern })),
    };

    let res = request.headers(headers).send().await?;
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

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
