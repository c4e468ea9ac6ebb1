//! Authorization guards.
//!
//! A guard inspects the context flowing into a procedure and either rejects the
//! call or forwards a (possibly narrowed) context to the next link. Forwarding
//! is the `Ok` return; the chain runner in [`crate::procedure::Tier`] plays the
//! role of `next`.

use crate::{
    context::{AuthedContext, ProcedureContext},
    error::RpcError,
    models::Permission,
};

type Check = fn(ProcedureContext) -> Result<ProcedureContext, RpcError>;

/// A named link in a guard chain.
#[derive(Clone, Copy)]
pub struct Guard {
    name: &'static str,
    check: Check,
}

impl Guard {
    pub const fn new(name: &'static str, check: Check) -> Self {
        Self { name, check }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, ctx: ProcedureContext) -> Result<ProcedureContext, RpcError> {
        (self.check)(ctx)
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Guard").field(&self.name).finish()
    }
}

pub const IS_AUTHED: Guard = Guard::new("is_authed", is_authed);
pub const IS_MODERATOR: Guard = Guard::new("is_moderator", is_moderator);
pub const IS_ADMIN: Guard = Guard::new("is_admin", is_admin);

/// is_authed
///
/// Rejects with `UNAUTHORIZED` unless both the session and its user are
/// present. Forwards the narrowed [`AuthedContext`].
pub fn is_authed(ctx: ProcedureContext) -> Result<ProcedureContext, RpcError> {
    match ctx {
        ProcedureContext::Authed(ctx) => Ok(ProcedureContext::Authed(ctx)),
        ProcedureContext::Anonymous(ctx) => match AuthedContext::try_from(ctx) {
            Ok(authed) => Ok(ProcedureContext::Authed(authed)),
            Err(_) => {
                tracing::debug!(guard = "is_authed", "rejected: no authenticated session");
                Err(RpcError::unauthorized())
            }
        },
    }
}

/// is_moderator
///
/// Rejects with `FORBIDDEN` when there is no session or the user only holds
/// `USER`. Admins pass: the moderator tier is inclusive of everything above it.
pub fn is_moderator(ctx: ProcedureContext) -> Result<ProcedureContext, RpcError> {
    let ctx = require_session("is_moderator", ctx)?;
    if ctx.user().permission == Permission::User {
        tracing::debug!(guard = "is_moderator", user_id = %ctx.user().id, "rejected: permission USER");
        return Err(RpcError::forbidden());
    }
    Ok(ProcedureContext::Authed(ctx))
}

/// is_admin
///
/// Rejects with `FORBIDDEN` when there is no session or the user is not `ADMIN`.
pub fn is_admin(ctx: ProcedureContext) -> Result<ProcedureContext, RpcError> {
    let ctx = require_session("is_admin", ctx)?;
    if ctx.user().permission != Permission::Admin {
        tracing::debug!(
            guard = "is_admin",
            user_id = %ctx.user().id,
            permission = ctx.user().permission.as_str(),
            "rejected: not ADMIN"
        );
        return Err(RpcError::forbidden());
    }
    Ok(ProcedureContext::Authed(ctx))
}

// Permission guards reject a missing session (or user) as FORBIDDEN; when
// chained after `is_authed` this branch is unreachable.
fn require_session(guard: &'static str, ctx: ProcedureContext) -> Result<AuthedContext, RpcError> {
    match ctx {
        ProcedureContext::Authed(ctx) => Ok(ctx),
        ProcedureContext::Anonymous(ctx) => AuthedContext::try_from(ctx).map_err(|_| {
            tracing::debug!(guard, "rejected: no session");
            RpcError::forbidden()
        }),
    }
}
