//! Hermod error types

use std::time::Duration;

/// Hermod error types
#[derive(Debug, thiserror::Error)]
pub enum HermodError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("empty response from model")]
    EmptyResponse,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Usage ledger
    #[error("monthly quota exceeded for '{identifier}' ({used}/{cap} tokens)")]
    QuotaExceeded {
        identifier: String,
        used: u64,
        cap: u64,
    },

    #[error("usage ledger error: {0}")]
    Ledger(String),
}

impl HermodError {
    /// Whether the failure is worth one more upstream attempt.
    ///
    /// Network failures and 5xx responses are transient. Timeouts are not:
    /// retrying would double the latency budget the caller already spent.
    pub fn is_transient(&self) -> bool {
        match self {
            HermodError::Http(_) => true,
            HermodError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status a caller should see for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HermodError::InvalidInput(_) | HermodError::Json(_) => 400,
            HermodError::QuotaExceeded { .. } => 429,
            HermodError::Configuration(_) | HermodError::Ledger(_) => 500,
            HermodError::Timeout(_) => 504,
            HermodError::Http(_)
            | HermodError::Api { .. }
            | HermodError::Stream(_)
            | HermodError::EmptyResponse => 502,
        }
    }

    /// Message safe to hand back to a client.
    ///
    /// Upstream bodies and configuration details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            HermodError::InvalidInput(msg) => format!("requisição inválida: {msg}"),
            HermodError::Json(_) => "requisição inválida: JSON malformado".to_string(),
            HermodError::QuotaExceeded { .. } => "limite mensal de uso atingido".to_string(),
            HermodError::Configuration(_) | HermodError::Ledger(_) => {
                "serviço não configurado corretamente".to_string()
            }
            HermodError::Timeout(_) => "o modelo demorou demais para responder".to_string(),
            HermodError::EmptyResponse => "o modelo não retornou resposta".to_string(),
            HermodError::Http(_) | HermodError::Api { .. } | HermodError::Stream(_) => {
                "erro ao consultar o modelo".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for HermodError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured budget
            HermodError::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            HermodError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            HermodError::Http(err.to_string())
        }
    }
}

/// Result type alias for Hermod operations
pub type Result<T> = std::result::Result<T, HermodError>;
