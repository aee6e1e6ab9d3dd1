//! Role resolution and authorization.
//!
//! Every moderation operation names the minimum [`RoleTier`] it needs and
//! checks it with [`Actor::require`].

mod tier;

pub use tier::{resolve_tier, Actor, AuthorizationError, RoleFlags, RoleTier};
