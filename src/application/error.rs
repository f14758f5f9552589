use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::application::auth::TokenError;
use crate::config::LoadError;
use crate::infra::error::InfraError;

const NO_DIAGNOSTIC: &str = "no diagnostic available";

/// Cause chain of a failed request, carried in the response extensions so the
/// access log can print it without the body having to expose it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut chain = vec![error.to_string()];
        let mut cause = error.source();
        while let Some(inner) = cause {
            chain.push(inner.to_string());
            cause = inner.source();
        }
        Self {
            source,
            status,
            chain,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            chain: vec![message.into()],
        }
    }

    /// Outermost message of the chain.
    pub fn detail(&self) -> &str {
        self.chain.first().map(String::as_str).unwrap_or(NO_DIAGNOSTIC)
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failure returned from the binary's entry point.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("invalid jwt settings: {0}")]
    Token(#[from] TokenError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
