use anyhow::Context;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api_client;
mod bot;
mod config;
mod handlers;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use crate::api_client::ApiClient;
use crate::config::BotConfig;
use crate::services::notify_service::TelegramNotifier;
use crate::services::settlement_service::PanelSettlement;
use crate::state::AppState;
use caramba_pay::repositories::{InvoiceJournal, NoopJournal, PgInvoiceJournal};
use caramba_pay::{GatewayConfig, InvoiceStore, LifecycleConfig, LifecycleManager, OddusGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "caramba_upi_bot=debug,caramba_pay=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env()?;
    tracing::info!("Starting Caramba UPI Bot...");
    tracing::info!("Gateway URL: {}", config.gateway_url);
    tracing::info!("Panel URL: {}", config.panel_url);

    let bot = Bot::new(config.bot_token.clone());
    let me = bot
        .get_me()
        .await
        .context("Bot failed to connect to Telegram")?;
    tracing::info!(
        "Bot connected as: @{}",
        me.username.clone().unwrap_or_else(|| "unknown".into())
    );

    let client_id = config
        .gateway_client_id
        .clone()
        .unwrap_or_else(|| format!("Caramba_{}", me.id.0));
    let gateway = OddusGateway::new(GatewayConfig {
        base_url: config.gateway_url.clone(),
        client_id,
        notification_url: config.webhook_url.clone(),
        timeout: config.gateway_timeout,
    })?;

    let journal: Arc<dyn InvoiceJournal> = match &config.database_url {
        Some(url) => {
            let pool = caramba_pay::db::connect(url).await?;
            tracing::info!("Invoice journal: PostgreSQL");
            Arc::new(PgInvoiceJournal::new(pool))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set: open invoices are kept in memory only and lost on restart"
            );
            Arc::new(NoopJournal)
        }
    };

    let api_client = ApiClient::new(config.panel_url.clone(), config.panel_token.clone());
    if !api_client.has_token() {
        tracing::warn!("PANEL_TOKEN is empty; settled payments will need manual crediting");
    }

    let manager = LifecycleManager::new(
        InvoiceStore::new(),
        Arc::new(gateway),
        Arc::new(PanelSettlement::new(api_client)),
        Arc::new(TelegramNotifier::new(bot.clone(), config.owner_id)),
        journal,
        LifecycleConfig {
            ttl: chrono::Duration::minutes(config.upi_expiry_minutes),
            admin_id: Some(config.owner_id),
        },
    );

    let listen_port = config.listen_port;
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(config, manager);

    state.manager.restore().await;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let sweeper = services::sweep_service::start_sweep_loop(
        state.manager.clone(),
        sweep_interval,
        shutdown_tx.subscribe(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Webhook server listening on {}", addr);

    let app = handlers::router(state.clone());
    let mut http_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.recv().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!("Webhook server failed: {}", e);
        }
    });

    // Webhook listener is already up; restored invoices are polled in the background.
    services::sweep_service::start_reconciliation(state.receiver.clone());

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            let _ = signal_tx.send(());
        }
    });

    bot::run_bot(bot, shutdown_tx.subscribe(), state).await;

    // Dispatcher may exit on its own; stop the rest either way.
    let _ = shutdown_tx.send(());
    let _ = sweeper.await;
    let _ = server.await;

    tracing::info!("Caramba UPI Bot stopped");
    Ok(())
}
