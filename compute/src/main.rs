//! Command-line front end for the Compute API client.

use anyhow::Context;
use clap::Parser;
use compute_client::{ComputeClient, ComputeConfig, ComputeRequest, OrExit};
use reqwest::Method;
use rust_common::{TracingConfig, init_tracing};
use tracing::info;

/// Call one Compute API endpoint and print the JSON result.
#[derive(Debug, Parser)]
#[command(name = "compute-cli", version)]
struct Args {
    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,

    /// Endpoint path relative to the Compute base URL, e.g. api/v1/hosts
    endpoint: String,

    /// Query parameter, repeatable
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_pair)]
    queries: Vec<(String, String)>,

    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,

    /// Follow Total-Count pagination
    #[arg(short, long)]
    paginated: bool,

    /// Print nothing and exit 0 when the API responds with an error
    #[arg(long)]
    tolerate_failure: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw}"))
}

impl Args {
    fn request(&self) -> anyhow::Result<ComputeRequest> {
        let mut request = ComputeRequest::new(self.method.clone(), &self.endpoint);
        for (key, value) in &self.queries {
            request = request.query(key, value);
        }
        if let Some(body) = &self.body {
            request = request.body(serde_json::from_str(body).context("--body is not valid JSON")?);
        }
        if self.paginated {
            request = request.paginated();
        }
        if self.tolerate_failure {
            request = request.tolerate_failure();
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut tracing = TracingConfig::default()
        .with_service_name("compute-cli")
        .with_log_level(&args.log_level);
    if args.json_logs {
        tracing = tracing.with_json_output();
    }
    init_tracing(&tracing)?;

    let request = args.request()?;
    let config = ComputeConfig::from_env().or_exit();
    let mut client = ComputeClient::new(&config).or_exit();

    info!(endpoint = %args.endpoint, "executing request");
    if let Some(result) = client.execute(&request).await.or_exit() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
