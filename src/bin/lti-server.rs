// ABOUTME: LTI 1.3 Advantage tool server binary with platform and key administration commands
// ABOUTME: Loads configuration from the environment, wires the engine, and serves the axum router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LTI Tool Server Binary
//!
//! - `serve` (default): run the HTTP server
//! - `register-platform`: manual platform registration
//! - `keygen`: print a fresh RSA private key for `LTI_KEY`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lti_advantage_server::{
    config::environment::ServerConfig,
    crypto::{keys::RSA_KEY_SIZE, ToolKeyPair},
    logging,
    lti::LtiEngine,
    middleware::setup_cors,
    models::NewPlatform,
    platform_store::{PlatformStore, SqlitePlatformStore},
    routes::{build_router, ServerResources},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lti-server")]
#[command(about = "LTI 1.3 Advantage tool server: launch, registration, grades, and rosters")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Override HTTP port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Register a platform manually (upserts on issuer and client id)
    RegisterPlatform {
        /// Platform issuer
        #[arg(long)]
        issuer: String,
        /// Client id assigned to this tool
        #[arg(long)]
        client_id: String,
        /// Deployment id
        #[arg(long)]
        deployment_id: Option<String>,
        /// OIDC authorization endpoint
        #[arg(long)]
        auth_login_url: String,
        /// OAuth2 token endpoint
        #[arg(long)]
        auth_token_url: String,
        /// Platform key set URL
        #[arg(long)]
        keyset_url: String,
    },
    /// Print a new PKCS#8 RSA private key
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if matches!(args.command, Some(Command::Keygen)) {
        let keys = ToolKeyPair::generate_with_key_size(RSA_KEY_SIZE)?;
        println!("{}", keys.export_private_key_pem()?);
        return Ok(());
    }

    logging::init_from_env()?;
    let mut config = ServerConfig::from_env()?;

    match args.command {
        Some(Command::RegisterPlatform {
            issuer,
            client_id,
            deployment_id,
            auth_login_url,
            auth_token_url,
            keyset_url,
        }) => {
            let store = SqlitePlatformStore::connect(&config.database.url).await?;
            let platform = store
                .upsert(NewPlatform {
                    issuer,
                    client_id,
                    deployment_id,
                    auth_login_url,
                    auth_token_url,
                    keyset_url,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&platform)?);
            Ok(())
        }
        Some(Command::Serve { port }) => {
            if let Some(port) = port {
                config.http_port = port;
            }
            serve(config).await
        }
        None | Some(Command::Keygen) => serve(config).await,
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!("Starting LTI tool server");
    info!("{}", config.summary());

    let keys = ToolKeyPair::from_pem(config.lti_key.expose())?;
    let store: Arc<dyn PlatformStore> =
        Arc::new(SqlitePlatformStore::connect(&config.database.url).await?);
    info!(database = %config.database.url, "Platform registry ready");

    let engine = LtiEngine::new(
        config.engine_settings(),
        keys,
        store,
        config.rewrites.clone(),
    )?;
    let resources = Arc::new(ServerResources::new(engine, config.frame_ancestors()));
    let app = build_router(resources, setup_cors(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "LTI tool server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await
    {
        error!("Server error: {e}");
        return Err(e.into());
    }
    Ok(())
}
