//! Result API + Telegram bot.
//!
//! Required env vars: TELEGRAM_BOT_TOKEN
//! Optional: PORT (default 3000), TELEGRAM_WEB_APP_URL, TELEGRAM_API_URL

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use tictactoe_promo::bot::run_bot;
use tictactoe_promo::chat_map::InMemoryChatStore;
use tictactoe_promo::server::{router, AppState};
use tictactoe_promo::telegram::{TelegramClient, TelegramConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tictactoe_promo=info,server=info".into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let config = TelegramConfig::from_env()?;
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .context("PORT must be a number")?;

    let chats: Arc<InMemoryChatStore> = Arc::new(InMemoryChatStore::new());
    let client = Arc::new(TelegramClient::new(&config));

    let bot = tokio::spawn(run_bot(
        Arc::clone(&client),
        chats.clone() as Arc<dyn tictactoe_promo::chat_map::ChatStore>,
        config.web_app_url.clone(),
    ));

    let state = AppState {
        chats,
        sender: client,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr} (POST /api/send, GET /api/health)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    bot.abort();
    Ok(())
}
