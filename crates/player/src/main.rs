//! Holdem Player - headless session client binary.
//!
//! Connects with `HOLDEM_TOKEN`, optionally joins `HOLDEM_ROOM_ID`, logs every
//! session event and disconnects on Ctrl-C.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holdem_player::{SessionClient, SessionConfig, SessionEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holdem_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Holdem Player");

    let config = SessionConfig::from_env();
    let token = std::env::var("HOLDEM_TOKEN").context("HOLDEM_TOKEN must be set")?;
    let room_id = match std::env::var("HOLDEM_ROOM_ID") {
        Ok(raw) => Some(
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("HOLDEM_ROOM_ID is not a room id: {raw}"))?,
        ),
        Err(_) => None,
    };

    let client = SessionClient::builder(config).build();
    client.on_any(log_event);

    // Queued until the socket opens if the first attempt is still in flight
    if let Some(room_id) = room_id {
        client.join_room(room_id).await;
    }

    if let Err(e) = client.connect(token).await {
        tracing::warn!(error = %e, "First connection attempt failed, retrying in the background");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    client.disconnect().await;
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Message(envelope) => {
            tracing::trace!(kind = %envelope.kind, "Frame received");
        }
        SessionEvent::Error(error) => tracing::warn!(error = %error, "Session error"),
        SessionEvent::ReconnectExhausted { attempts } => {
            tracing::error!(attempts, "Gave up reconnecting");
        }
        other => tracing::info!(event = ?other, "Session event"),
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
