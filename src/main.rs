//! Command-line access to the portal's upstream integrations.
//!
//! ```text
//! portal-integrations [--config FILE] lookup regions US
//! portal-integrations [--config FILE] lookup places US Springfield --region IL
//! portal-integrations [--config FILE] request GET /shipments/42
//! ```
//!
//! Results are printed as JSON on stdout. Failures print the error kind on
//! stderr and exit non-zero.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

use portal_integrations::config::{load_config, IntegrationsConfig};
use portal_integrations::http::Method;
use portal_integrations::observability::{logging, metrics};
use portal_integrations::{
    ApiRequest, IntegrationError, IntegrationResult, Lookup, LookupClient, LookupSource,
    SessionClient,
};

#[derive(Parser)]
#[command(name = "portal-integrations")]
#[command(about = "Query the shipping portal's upstream integrations", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment overrides apply either way.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reference-data lookups
    Lookup {
        #[command(subcommand)]
        lookup: LookupCommand,
    },
    /// Authorized request against the login-gated upstream
    Request {
        /// HTTP method (GET, POST, ...)
        method: String,
        /// Absolute URL or path under session.base_url
        target: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum LookupCommand {
    /// All countries
    Countries,
    /// First-level divisions of a country
    Regions { country: String },
    /// Populated places in a region, largest first
    Cities { country: String, region: String },
    /// Places by name
    Places {
        country: String,
        place: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Postal codes of a place
    PostalCodes { country: String, place: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path),
        None => IntegrationsConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match run(cli.command, config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: IntegrationsConfig) -> IntegrationResult<Value> {
    match command {
        Commands::Lookup { lookup } => {
            let client = LookupClient::new(config.lookup)?;
            match lookup {
                LookupCommand::Countries => Ok(render(client.countries().await?)),
                LookupCommand::Regions { country } => Ok(render(client.regions(&country).await?)),
                LookupCommand::Cities { country, region } => {
                    Ok(render(client.cities(&country, &region).await?))
                }
                LookupCommand::Places {
                    country,
                    place,
                    region,
                } => Ok(render(
                    client.places(&country, region.as_deref(), &place).await?,
                )),
                LookupCommand::PostalCodes { country, place } => {
                    Ok(render(client.postal_codes(&country, &place).await?))
                }
            }
        }
        Commands::Request {
            method,
            target,
            body,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|_| {
                IntegrationError::Configuration(format!("invalid HTTP method '{}'", method))
            })?;
            let mut request = ApiRequest::new(method, target);
            if let Some(body) = body {
                let body = serde_json::from_str(&body).map_err(|e| {
                    IntegrationError::Configuration(format!("--body is not valid JSON: {}", e))
                })?;
                request = request.json(body);
            }

            let client = SessionClient::new(config.session)?;
            let response = client.authorized_request(request).await?;
            let body = response
                .json::<Value>()
                .unwrap_or_else(|_| Value::String(response.text()));
            Ok(json!({ "status": response.status, "body": body }))
        }
    }
}

fn render<T: Serialize>(lookup: Lookup<T>) -> Value {
    let (source, error) = match &lookup.source {
        LookupSource::Upstream => ("upstream", None),
        LookupSource::Cache => ("cache", None),
        LookupSource::StaleCache { error } => ("stale_cache", Some(error.to_string())),
        LookupSource::Degraded { error } => ("degraded", Some(error.to_string())),
    };
    json!({
        "source": source,
        "error": error,
        "count": lookup.len(),
        "records": lookup.records,
    })
}
