// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ChatVibes API Server

use chatvibes_api::{
    config::Config,
    db::FirestoreDb,
    services::{kms::TOKEN_KEY_NAME, KmsService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting ChatVibes API");

    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let kms = KmsService::new(&config.gcp_project_id, &config.gcp_region, TOKEN_KEY_NAME).await?;

    if !config.tts_configured() {
        tracing::warn!("REPLICATE_API_TOKEN not set, TTS test endpoint disabled");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config, db, kms));
    let app = chatvibes_api::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatvibes_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
