//! Procedure routers, one module per privilege tier.
//!
//! Each module only declares procedures of its own tier, so the tier of any
//! procedure can be read off the file it lives in.

use crate::{repository::RepositoryState, router::RpcRouter};

/// Procedures open to every caller, signed in or not.
pub mod public;

/// Procedures behind `is_authed`.
pub mod protected;

/// Procedures behind `is_authed` + `is_moderator`.
pub mod moderator;

/// Procedures behind `is_authed` + `is_admin`.
pub mod admin;

/// app_router
///
/// The complete procedure tree served by the HTTP adapter.
pub fn app_router(repo: RepositoryState) -> RpcRouter {
    RpcRouter::new()
        .nest("auth", public::public_routes())
        .nest("user", protected::protected_routes(repo.clone()))
        .nest("moderation", moderator::moderator_routes(repo.clone()))
        .nest("admin", admin::admin_routes(repo))
}
