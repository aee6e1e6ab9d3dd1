//! Authentication boundary.
//!
//! Access tokens are issued by the external session service. This module
//! only verifies them and turns the bearer into an [`Actor`](crate::permissions::Actor)
//! snapshot for the rest of the request.

mod error;
pub mod jwt;
mod middleware;

pub use error::{AuthError, AuthResult};
pub use middleware::require_auth;
