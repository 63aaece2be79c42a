// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Vizier Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

// Minimal bootstrap; routing and rendering live in the library modules.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use vizier::{ChartEngine, EngineConfig, OllamaClassifier};
use vizier_server::http::{build_router, AppState};
use vizier_server::render::PlottersRenderer;
use vizier_server::settings::Settings;

#[derive(Parser, Debug, Clone)]
#[command(name = "vizier-server", about = "Query-to-chart inference service")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();
    match cli.cmd.unwrap_or(Command::Serve { addr: None }) {
        Command::Serve { addr } => run_server(addr).await,
    }
}

async fn run_server(addr_override: Option<String>) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(addr) = addr_override {
        settings.bind_addr = addr;
    }

    let engine_config = match &settings.engine_config_path {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = ChartEngine::with_config(engine_config)?;
    let renderer = PlottersRenderer::new(settings.chart_width, settings.chart_height);
    let classifier = if settings.classifier.enabled {
        Some(OllamaClassifier::new(
            settings.classifier.base_url.clone(),
            settings.classifier.model.clone(),
            settings.classifier.timeout_secs,
        )?)
    } else {
        info!("external classifier disabled; keyword fallback only");
        None
    };

    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState {
        engine,
        renderer,
        classifier,
        settings,
    });
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "vizier-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
