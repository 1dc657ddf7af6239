//! Tail the salt-api event bus.
//!
//! Reads `SALTAPI_URL` (and friends) from the environment, logs in with
//! `SALTAPI_USER` / `SALTAPI_PASS` / `SALTAPI_EAUTH` unless a token is
//! configured, and prints every event whose tag starts with the optional
//! first argument.
//!
//! ```text
//! SALTAPI_URL=https://salt:8000 SALTAPI_USER=saltdev SALTAPI_PASS=saltdev \
//!     cargo run -p event-tail -- salt/job/
//! ```

use anyhow::{Context, Result};
use futures::StreamExt;
use saltapi_core::FleetEvent;
use saltapi_session::Client;
use saltapi_transport::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_EAUTH: &str = "auto";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let prefix = std::env::args().nth(1).unwrap_or_default();
    let config = ClientConfig::from_env().context("loading salt-api configuration")?;
    let client = Client::new(&config).context("building salt-api client")?;

    let logged_in = ensure_session(&client, |key| std::env::var(key).ok()).await?;

    let mut events = client.events().await.context("opening event stream")?;
    tracing::info!(api_url = %config.api_url, prefix, "tailing events");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            next = events.next() => match next {
                Some(Ok(event)) => print_event(&event, &prefix)?,
                Some(Err(e)) => {
                    tracing::error!("event stream failed: {e}");
                    break;
                }
                None => {
                    tracing::info!("event stream closed by server");
                    break;
                }
            },
        }
    }

    drop(events);
    // An environment-supplied token stays valid.
    if logged_in {
        if let Err(e) = client.logout().await {
            tracing::warn!("logout failed: {e}");
        }
    }
    Ok(())
}

/// Log in from `SALTAPI_USER` / `SALTAPI_PASS` / `SALTAPI_EAUTH` unless the
/// client was seeded with a token. Returns `true` if this call logged in.
async fn ensure_session<F>(client: &Client, lookup: F) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    if client.is_authenticated() {
        return Ok(false);
    }
    let user = lookup("SALTAPI_USER").context("SALTAPI_USER is not set")?;
    let pass = lookup("SALTAPI_PASS").unwrap_or_default();
    let eauth = lookup("SALTAPI_EAUTH").unwrap_or_else(|| DEFAULT_EAUTH.to_owned());
    client
        .login(&user, &pass, &eauth)
        .await
        .context("logging in")?;
    Ok(true)
}

fn print_event(event: &FleetEvent, prefix: &str) -> Result<()> {
    if !event.matches(prefix) {
        return Ok(());
    }
    match event.jid() {
        Some(jid) => println!("{} [{jid}]", event.tag),
        None => println!("{}", event.tag),
    }
    println!("{}", serde_json::to_string_pretty(&event.data)?);
    Ok(())
}
