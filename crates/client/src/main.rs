//! Servicedesk watcher - connects to a servicedesk endpoint and logs live
//! events until interrupted. Stand-in for the dashboard UI.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use servicedesk_client::realtime::{scope, RealtimeClient};
use servicedesk_shared::ChannelKey;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("servicedesk_client=debug")),
        )
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SERVICEDESK_WS_URL").ok())
        .context("usage: servicedesk-client <ws-url> (or set SERVICEDESK_WS_URL)")?;
    let user_id: i64 = std::env::var("SERVICEDESK_USER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let client = RealtimeClient::connect(&endpoint)?;

    let _requests = client.subscribe(
        ChannelKey::requests_global(),
        scope::requests(),
        |event| tracing::info!(topic = event.topic(), ?event, "service request activity"),
    );
    let _notifications = client.subscribe(
        ChannelKey::notifications(user_id),
        scope::notifications(user_id),
        |event| tracing::info!(?event, "notification"),
    );

    tokio::signal::ctrl_c().await?;
    client.disconnect();
    Ok(())
}
