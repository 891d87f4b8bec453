//! Nimbus CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nimbus_auth::{Auth, AuthConfig, Session};
use nimbus_client::{ClientBuilder, NimbusClient};
use nimbus_config::{load_config, ClientConfig, LogFormat};
use nimbus_functions::{Functions, FunctionsConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Nimbus SDK command line", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(short, long, global = true, env = "NIMBUS_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "nimbus.yaml")]
        config: PathBuf,
    },

    /// Build a client and list the installed plugins
    Plugins {
        /// Path to configuration file
        #[arg(short, long, default_value = "nimbus.yaml")]
        config: PathBuf,
    },

    /// Invoke a serverless function
    Invoke {
        /// Path to configuration file
        #[arg(short, long, default_value = "nimbus.yaml")]
        config: PathBuf,

        /// Function name
        function: String,

        /// JSON request body
        #[arg(short, long, default_value = "{}")]
        body: String,

        /// User access token sent instead of the API key
        #[arg(long, env = "NIMBUS_ACCESS_TOKEN")]
        access_token: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            let path = config;
            let config = load(&path)?;
            init_tracing(cli.log_level.as_deref(), &config)?;

            tracing::info!("Configuration is valid: {}", path.display());
            tracing::info!("  Host: {}", config.host);
            tracing::info!("  HTTPS: {}", config.use_https);
            tracing::info!("  Request timeout: {:?}", config.request_timeout);
            tracing::info!("  Teardown: {:?}", config.teardown);
            tracing::info!("  Plugins: {}", config.plugins.len());
            Ok(())
        }

        Commands::Plugins { config } => {
            let config = load(&config)?;
            init_tracing(cli.log_level.as_deref(), &config)?;

            let client = builder_from_config(&config)?.build().await?;

            for plugin in client.plugins()?.iter() {
                println!("{:<12} {}", plugin.key(), plugin.type_name());
            }

            client.close().await?;
            Ok(())
        }

        Commands::Invoke {
            config,
            function,
            body,
            access_token,
        } => {
            let config = load(&config)?;
            init_tracing(cli.log_level.as_deref(), &config)?;

            let body: serde_json::Value =
                serde_json::from_str(&body).context("--body must be valid JSON")?;

            let mut builder = builder_from_config(&config)?;
            if !builder.installed_keys().any(|k| *k == Functions::KEY) {
                builder = builder.install_default(Functions)?;
            }
            if access_token.is_some() && !builder.installed_keys().any(|k| *k == Auth::KEY) {
                builder = builder.install_default(Auth)?;
            }

            let client = builder.build().await?;
            let result = invoke(&client, &function, &body, access_token).await;
            client.close().await?;

            println!("{}", serde_json::to_string_pretty(&result?)?);
            Ok(())
        }

        Commands::Version => {
            println!("Nimbus SDK");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<ClientConfig> {
    load_config(path, true).with_context(|| format!("Invalid configuration: {}", path.display()))
}

async fn invoke(
    client: &NimbusClient,
    function: &str,
    body: &serde_json::Value,
    access_token: Option<String>,
) -> Result<serde_json::Value> {
    if let Some(token) = access_token {
        client.plugin(&Auth)?.set_session(Session::new(token))?;
    }

    let response = client.plugin(&Functions)?.invoke(function, body).await?;

    tracing::info!(function, status = %response.status(), "Function invoked");

    Ok(response
        .json()
        .unwrap_or_else(|_| serde_json::Value::String(response.text())))
}

/// Builder with every plugin that has a section in the configuration
fn builder_from_config(config: &ClientConfig) -> Result<ClientBuilder> {
    let mut builder = ClientBuilder::from_config(config)?;

    for key in config.plugins.keys() {
        builder = match key.as_str() {
            "auth" => {
                let section: AuthConfig = config.plugin_section(key)?.unwrap_or_default();
                builder.install(Auth, |c| *c = section)?
            }
            "functions" => {
                let section: FunctionsConfig = config.plugin_section(key)?.unwrap_or_default();
                builder.install(Functions, |c| *c = section)?
            }
            other => {
                tracing::warn!(plugin = other, "Unknown plugin in configuration, skipping");
                builder
            }
        };
    }

    Ok(builder)
}

fn init_tracing(level: Option<&str>, config: &ClientConfig) -> Result<()> {
    let level = level.unwrap_or(&config.logging.level);
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
    }

    Ok(())
}
