//! Payload transport.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use snafu::Snafu;

use crate::GenericError;

mod client;
pub use self::client::{HttpTransport, USER_AGENT};

/// A transport error.
///
/// Transport errors mean that no response status was obtained at all, as opposed to the ingest endpoint responding with
/// a non-success status.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum TransportError {
    /// The request could not be built.
    #[snafu(display("failed to build ingest request: {}", source))]
    BuildRequest {
        /// Error source.
        source: http::Error,
    },

    /// The request could not be sent, or no response was received.
    #[snafu(display("failed to send ingest request: {}", source))]
    SendRequest {
        /// Error source.
        source: GenericError,
    },

    /// No response was received within the request timeout.
    #[snafu(display("ingest request timed out after {:?}", timeout))]
    Timeout {
        /// Configured request timeout.
        timeout: Duration,
    },
}

/// Sends metric payloads to an ingest endpoint.
///
/// Implementations are shared across export calls and must not require mutable access to send a payload.
#[async_trait]
pub trait IngestTransport: Send + Sync {
    /// Sends a single payload, made up of newline-separated metric lines, and returns the response status.
    ///
    /// # Errors
    ///
    /// If the payload could not be delivered, or no response was received, an error is returned.
    async fn send(&self, payload: String) -> Result<StatusCode, TransportError>;
}

#[async_trait]
impl<T> IngestTransport for std::sync::Arc<T>
where
    T: IngestTransport + ?Sized,
{
    async fn send(&self, payload: String) -> Result<StatusCode, TransportError> {
        (**self).send(payload).await
    }
}
