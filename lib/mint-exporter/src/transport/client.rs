use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt as _, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use rustls::{ClientConfig, RootCertStore};
use tracing::{debug, trace};

use super::{IngestTransport, TransportError};
use crate::{ErrorContext as _, GenericError};

/// User agent sent with every ingest request.
pub const USER_AGENT: &str = concat!("mint-exporter/", env!("CARGO_PKG_VERSION"));

const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// HTTP transport for the metric ingest API.
///
/// Sends each payload as a single `POST` request with a `text/plain` body, authenticating with an API token when one is
/// configured. Supports both HTTP and HTTPS endpoints, using the platform's root certificates for server certificate
/// validation.
///
/// The underlying client pools connections and is safe to share between concurrent callers.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    endpoint: Uri,
    authorization: Option<HeaderValue>,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` for the given ingest endpoint.
    ///
    /// # Errors
    ///
    /// If the platform's root certificates cannot be loaded, or if the API token cannot be used as a header value, an
    /// error is returned.
    pub fn new(endpoint: Uri, api_token: Option<&str>, request_timeout: Duration) -> Result<Self, GenericError> {
        let connector = build_connector(&endpoint)?;

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(45))
            .build(connector);

        let authorization = api_token
            .map(|token| {
                let mut value = HeaderValue::from_str(&format!("Api-Token {}", token))?;
                value.set_sensitive(true);
                Ok::<_, header::InvalidHeaderValue>(value)
            })
            .transpose()
            .error_context("API token is not a valid header value.")?;

        Ok(Self {
            client,
            endpoint,
            authorization,
            request_timeout,
        })
    }

    /// Returns the ingest endpoint.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    fn build_request(&self, payload: String) -> Result<Request<Full<Bytes>>, http::Error> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, CONTENT_TYPE_TEXT_PLAIN)
            .header(header::USER_AGENT, USER_AGENT);

        if let Some(authorization) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization.clone());
        }

        builder.body(Full::new(Bytes::from(payload)))
    }
}

fn build_connector(endpoint: &Uri) -> Result<HttpsConnector<HttpConnector>, GenericError> {
    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        // Plaintext endpoints, such as a local host agent, don't need any root certificates.
        Err(e) if endpoint.scheme_str() != Some("https") => {
            debug!(error = %e, "Failed to load native root certificates. HTTPS endpoints will not be reachable.");
            let tls_config = ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth();
            HttpsConnectorBuilder::new().with_tls_config(tls_config)
        }
        Err(e) => return Err(GenericError::new(e).context("Failed to load native root certificates.")),
    };

    Ok(builder.https_or_http().enable_http1().build())
}

#[async_trait]
impl IngestTransport for HttpTransport {
    async fn send(&self, payload: String) -> Result<StatusCode, TransportError> {
        let payload_len = payload.len();
        let request = self
            .build_request(payload)
            .map_err(|source| TransportError::BuildRequest { source })?;

        let response = match tokio::time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(TransportError::SendRequest {
                    source: GenericError::from(e),
                })
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    timeout: self.request_timeout,
                })
            }
        };

        let status = response.status();

        // The response body only carries diagnostics (accepted/rejected line counts), so failing to read it doesn't
        // change the outcome of the request.
        match response.into_body().collect().await {
            Ok(body) => {
                let body = body.to_bytes();
                if status.is_success() {
                    trace!(status = status.as_u16(), payload_len, body = %String::from_utf8_lossy(&body), "Ingest request succeeded.");
                } else {
                    debug!(status = status.as_u16(), payload_len, body = %String::from_utf8_lossy(&body), "Ingest request failed.");
                }
            }
            Err(e) => debug!(error = %e, status = status.as_u16(), "Failed to read ingest response body."),
        }

        Ok(status)
    }
}
