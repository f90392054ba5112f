use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use healthlock::{
    handle_request, initialize_root, rpc_codes, shutdown_root, JsonRpcRequest, JsonRpcResponse,
    RootConfig, RootError, SigningConfig,
};
use healthlock_cred::{AccessDuration, Role};

/// HealthLock: time-boxed, role-scoped access to patient records
///
/// Issues signed access tokens for healthcare providers, enforces their
/// expiry and revocation, and keeps an audit trail of every decision.
#[derive(Parser, Debug)]
#[command(name = "healthlock", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a configuration file with a fresh signing key
    Init {
        /// Leave the signing key unset so each run generates its own
        #[arg(long)]
        ephemeral_key: bool,
    },

    /// Serve JSON-RPC requests on stdio, one per line
    Serve,

    /// Print the role catalog and the allowed durations
    Roles,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("healthlock=debug,healthlock_cred=debug,healthlock_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("healthlock=info"))
    };

    // Logs go to stderr; stdout carries JSON-RPC responses.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Init { ephemeral_key } => cmd_init(cli.config.as_ref(), ephemeral_key).await,
        Commands::Serve => cmd_serve(cli.config.as_ref()).await,
        Commands::Roles => cmd_roles(),
    }
}

async fn cmd_init(config_path: Option<&PathBuf>, ephemeral_key: bool) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;

    config.signing = if ephemeral_key {
        SigningConfig::default()
    } else {
        SigningConfig::generate()
    };
    config.validate()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;
    info!(path = %save_path.display(), "configuration written");

    println!("HealthLock initialized successfully.");
    println!("  Config:      {}", save_path.display());
    println!(
        "  Signing key: {}",
        if ephemeral_key {
            "generated per run"
        } else {
            "stored in config"
        }
    );
    println!("  Export:      {}", config.export.format);

    Ok(())
}

async fn cmd_serve(config_path: Option<&PathBuf>) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let mut state = initialize_root(config)?;

    info!("serving JSON-RPC on stdio");

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);

    use tokio::io::AsyncBufReadExt;
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => handle_request(&state, &request),
            Err(e) => JsonRpcResponse::error(
                serde_json::Value::Null,
                rpc_codes::PARSE_ERROR,
                format!("parse error: {}", e),
            ),
        };
        let response_json = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"serialization failed"},"id":null}"#
                .to_string()
        });
        println!("{}", response_json);
    }

    shutdown_root(&mut state)?;
    Ok(())
}

fn cmd_roles() -> Result<(), RootError> {
    println!("Roles:");
    for role in Role::ALL {
        let permissions: Vec<String> = role.permissions().iter().map(|p| p.to_string()).collect();
        println!(
            "  {:<12} {:<34} {}",
            role.as_str(),
            role.label(),
            permissions.join(", ")
        );
    }
    println!("Durations:");
    for duration in AccessDuration::ALL {
        println!(
            "  {:<12} {:<34} {}s",
            duration.as_str(),
            duration.label(),
            duration.seconds()
        );
    }
    Ok(())
}
