/// Router Module Index
///
/// Splits the API by how much identity a request must carry. Role checks are
/// attached per route when the router is built, never decided inside handlers.

/// Routes that need no session: liveness and login.
pub mod public;

/// Routes behind the `authenticate` layer, each gated by a static `RoleSet`.
pub mod authenticated;
