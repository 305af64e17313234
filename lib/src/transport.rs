//! The graph transport: SPARQL protocol requests and plain document dereferencing.
use crate::error::TransportError;
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;
use url::Url;

/// The liveness probe sent to an endpoint.
pub const PING_QUERY: &str = "SELECT * WHERE {?s ?p ?o} LIMIT 1";

/// The kind of result a query is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// `CONSTRUCT`/`DESCRIBE`: an RDF document.
    ConstructGraph,
    /// `SELECT`/`ASK`: tabular bindings.
    SelectBindings,
}

impl Accept {
    pub fn media_type(&self) -> &'static str {
        match self {
            Accept::ConstructGraph => "text/turtle",
            Accept::SelectBindings => "application/sparql-results+json",
        }
    }
}

/// Sends queries to a SPARQL endpoint and fetches documents.
///
/// Implementations own timeouts; a timed-out request surfaces as [`TransportError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `query` against `endpoint` and returns the raw response body.
    async fn query(&self, endpoint: &Url, query: &str, accept: Accept)
        -> Result<String, TransportError>;

    /// Dereferences `document` asking for Turtle.
    async fn fetch(&self, document: &Url) -> Result<String, TransportError>;
}

/// Checks that `endpoint` answers a trivial query.
pub async fn ping(transport: &dyn Transport, endpoint: &Url) -> Result<(), TransportError> {
    transport
        .query(endpoint, PING_QUERY, Accept::SelectBindings)
        .await
        .map(|_| ())
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout: Duration::from_secs(60),
            user_agent: format!("cube-validator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`Transport`] over HTTP, speaking the SPARQL 1.1 protocol with form-encoded POSTs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                message: format!("could not build HTTP client: {}", e),
            })?;
        Ok(HttpTransport {
            client,
            user_agent: config.user_agent,
        })
    }

    async fn read(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<String, TransportError> {
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| request_error(url, e))
    }
}

fn request_error(url: &Url, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(
        &self,
        endpoint: &Url,
        query: &str,
        accept: Accept,
    ) -> Result<String, TransportError> {
        debug!("POST {} ({} bytes of query)", endpoint, query.len());
        let request = self
            .client
            .post(endpoint.clone())
            .header(ACCEPT, accept.media_type())
            .form(&[("query", query)]);
        self.read(endpoint, request).await
    }

    async fn fetch(&self, document: &Url) -> Result<String, TransportError> {
        debug!("GET {}", document);
        let request = self
            .client
            .get(document.clone())
            .header(ACCEPT, Accept::ConstructGraph.media_type());
        self.read(document, request).await
    }
}
