//! Error taxonomy for a validation run.
//!
//! Reaching a page or violation ceiling is not an error; see [`crate::types::Termination`].

/// A failure of the graph transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status code.
    #[error("<{url}> answered with HTTP {status}")]
    Status { url: String, status: u16 },
    /// The request did not complete before the transport's timeout.
    #[error("request to <{url}> timed out")]
    Timeout { url: String },
    /// Any other failure to send the request or read its body.
    #[error("request to <{url}> failed: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    /// The HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// An error that ends a validation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shape graph or profile document could not be retrieved or parsed.
    ///
    /// This means the run is misconfigured, not that the data is non-conformant.
    #[error("shape graph <{iri}> is unavailable: {reason}")]
    Configuration {
        iri: String,
        status: Option<u16>,
        reason: String,
    },
    /// A data request failed mid-run.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A response did not contain well-formed RDF.
    #[error("malformed RDF from <{source_iri}>: {message}")]
    Parse { source_iri: String, message: String },
    /// The constraint engine could not evaluate the shapes.
    #[error("constraint engine failed: {0}")]
    Engine(String),
}

impl Error {
    /// The upstream HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Configuration { status, .. } => *status,
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// True when the error stems from a shape graph or profile, not from the data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    pub(crate) fn configuration(iri: &str, cause: Error) -> Error {
        match cause {
            Error::Configuration { .. } => cause,
            other => Error::Configuration {
                iri: iri.to_string(),
                status: other.status(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
