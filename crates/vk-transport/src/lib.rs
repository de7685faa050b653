//! VK API Transport
//!
//! The session crate talks to the VK servers through the [`Transport`]
//! trait defined here: one form-encoded POST per call, response body
//! returned as text. [`HttpTransport`] is the reqwest-backed
//! implementation; tests substitute their own.

mod error;
mod http;

pub use error::TransportError;
pub use http::{HttpTransport, Transport};

pub type Result<T> = std::result::Result<T, TransportError>;
