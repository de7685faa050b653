//! VK API Session
//!
//! A [`Session`] is a handle on an authenticated connection to the VK API
//! and exposes every remote method without a hand-written binding per
//! method:
//! - [`Session::call`] performs one HTTPS form POST and returns the
//!   `response` payload of the reply
//! - [`Session::friends`] and the rest of [`Session::NAMESPACES`] return
//!   memoized child sessions whose calls are namespace-qualified
//!   (`friends.get`)
//! - [`Session::invoke`] is the generic entry point resolving an arbitrary
//!   name to either of the above
//!
//! A failed call surfaces as a [`ServerError`] carrying the full request
//! context; transport and decoding failures propagate as their own error
//! variants and are never masked as server errors.

mod error;
mod method;
mod request;
mod session;

pub use error::{ApiError, ServerError};
pub use session::{AppId, Dispatch, Params, Session};

pub type Result<T> = std::result::Result<T, ApiError>;
