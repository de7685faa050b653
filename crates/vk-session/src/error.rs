//! Session error types

use std::collections::BTreeMap;

use thiserror::Error;

use crate::session::Session;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("access token must be a non-empty string")]
    InvalidAccessToken,

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("transport error: {0}")]
    Transport(#[from] vk_transport::TransportError),

    #[error("malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Error reported by the VK server for one remote call.
///
/// Carries everything needed to diagnose the failure: the originating
/// session, the full method name sent, the exact form fields sent
/// (including the injected access token) and the raw `error` value from
/// the response body, uninterpreted.
#[derive(Error, Debug, Clone)]
#[error("server side error calling VK method {method}: {error}")]
pub struct ServerError {
    pub session: Session,
    pub method: String,
    pub params: BTreeMap<String, String>,
    pub error: serde_json::Value,
}
