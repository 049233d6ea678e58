//! Error types shared across the pipeline.
//!
//! Only fatal conditions travel up to the caller. Low confidence is not an
//! error; it is a normal validation outcome handled by retry and fallback.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// External collaborator a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Llm,
    TextToSpeech,
    ImageSearch,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Llm => "LLM completion API",
            Service::TextToSpeech => "text-to-speech API",
            Service::ImageSearch => "image search API",
        };
        f.write_str(name)
    }
}

/// A single call to an external service failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} quota exhausted: {message}")]
    QuotaExceeded { service: Service, message: String },

    #[error("{service} rejected the credentials ({status}): {message}")]
    Unauthorized {
        service: Service,
        status: u16,
        message: String,
    },

    #[error("{service} error ({status}): {body}")]
    Http {
        service: Service,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {source}")]
    Network {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse { service: Service, message: String },
}

impl ServiceError {
    /// Classify a non-success HTTP response.
    ///
    /// A 429 is only a quota failure when the body talks about quota or
    /// billing; a bare 429 is an ordinary rate limit and can be retried.
    pub fn from_status(service: Service, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ServiceError::Unauthorized {
                service,
                status,
                message: body,
            },
            402 => ServiceError::QuotaExceeded {
                service,
                message: body,
            },
            429 if mentions_quota(&body) => ServiceError::QuotaExceeded {
                service,
                message: body,
            },
            _ => ServiceError::Http {
                service,
                status,
                body,
            },
        }
    }

    pub fn network(service: Service, source: reqwest::Error) -> Self {
        ServiceError::Network { service, source }
    }

    pub fn invalid(service: Service, message: impl Into<String>) -> Self {
        ServiceError::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> Service {
        match self {
            ServiceError::QuotaExceeded { service, .. }
            | ServiceError::Unauthorized { service, .. }
            | ServiceError::Http { service, .. }
            | ServiceError::Network { service, .. }
            | ServiceError::InvalidResponse { service, .. } => *service,
        }
    }

    /// Quota exhaustion and rejected credentials stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::QuotaExceeded { .. } | ServiceError::Unauthorized { .. }
        )
    }

    /// Network failures, 5xx responses and plain rate limits are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network { .. } => true,
            ServiceError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn mentions_quota(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("quota") || body.contains("billing") || body.contains("insufficient_funds")
}

/// The raw model output held nothing that looks like JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response contains no JSON object or array")]
    NoJson,
}

/// Problems loading language profiles, dictionaries or settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown language code: '{0}'")]
    UnknownLanguage(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile YAML for '{language}': {source}")]
    Yaml {
        language: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid dictionary JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid fallback pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Errors the orchestrator surfaces to its caller. Everything else degrades
/// into a lower confidence score.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stopping: {0}")]
    Fatal(#[from] ServiceError),

    #[error("stopping: the LLM returned no JSON in any of {attempts} attempts for a batch of {sentences} sentence(s)")]
    NoStructuredOutput { attempts: u32, sentences: usize },
}
