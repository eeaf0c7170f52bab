// ABOUTME: Parley server binary: loads configuration, wires collaborators and serves HTTP
// ABOUTME: Owns the lifecycle of the database pool, embedding client and token verifier
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Parley Server Binary
//!
//! Starts the conversation persistence and semantic search API.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use parley_server::{
    auth::{FirebaseAuth, TokenVerifier},
    config::{DatabaseUrl, ServerConfig},
    database_plugins::factory::Database,
    embeddings::{EmbeddingProvider, OpenAiEmbeddings},
    logging,
    resources::ServerResources,
    server::ParleyServer,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "parley-server")]
#[command(about = "Parley - conversation persistence and semantic message search API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the database URL (`sqlite:path`, `sqlite::memory:`, `postgres://...`)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.database.url = DatabaseUrl::parse_url(url)?;
    }
    info!("{}", config.summary());

    let database = Database::from_config(&config.database, config.embedding.dimensions).await?;
    info!(backend = database.backend_info(), "Database ready");

    if config.embedding.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; embedding requests will be sent without credentials");
    }
    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(OpenAiEmbeddings::new(config.embedding.clone())?);
    info!(
        model = embeddings.model(),
        dimensions = embeddings.dimensions(),
        "Embedding provider ready"
    );

    let firebase = FirebaseAuth::new(config.firebase.clone());
    if !firebase.is_enabled() {
        warn!("Firebase authentication is not configured; every API request will be rejected");
    }
    let verifier: Arc<dyn TokenVerifier> = Arc::new(firebase);

    let resources = Arc::new(ServerResources::new(
        Arc::new(database),
        embeddings,
        verifier,
        Arc::new(config),
    ));

    if let Err(e) = ParleyServer::new(resources).run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
