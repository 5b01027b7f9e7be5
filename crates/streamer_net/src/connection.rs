//! NATS connection management.
//!
//! Provides a thin wrapper around `async-nats` for connecting to NATS and
//! receiving decoded streamer ingress.

use futures::future;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{info, warn};

use crate::error::NetError;
use crate::messages::Ingress;
use crate::subjects;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Pick the NATS URL: an explicit value wins, then the `NATS_URL`
/// environment variable, then [`DEFAULT_NATS_URL`].
#[must_use]
pub fn resolve_url(explicit: Option<&str>) -> String {
    explicit.map_or_else(
        || std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string()),
        str::to_string,
    )
}

/// A wrapper around an `async-nats` client with streamer-specific helpers.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Subscribe to every streamer subject and decode what arrives.
    ///
    /// Undecodable messages are logged and skipped; the stream ends when the
    /// connection closes.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn ingress(&self) -> Result<BoxStream<'static, Ingress>, NetError> {
        let subscriber = self.client.subscribe(subjects::ALL.to_string()).await?;
        info!(subject = subjects::ALL, "subscribed to streamer ingress");
        Ok(subscriber
            .filter_map(|msg| future::ready(decode_message(&msg)))
            .boxed())
    }
}

fn decode_message(msg: &async_nats::Message) -> Option<Ingress> {
    match Ingress::decode(msg.subject.as_str(), &msg.payload) {
        Ok(ingress) => Some(ingress),
        Err(e) => {
            warn!(subject = %msg.subject, error = %e, "dropping ingress message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_url_wins() {
        assert_eq!(resolve_url(Some("nats://10.0.0.5:4222")), "nats://10.0.0.5:4222");
    }
}
