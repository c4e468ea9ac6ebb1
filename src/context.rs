use chrono::{DateTime, Utc};

use crate::{
    error::RpcError,
    models::{Session, User},
};

/// Context
///
/// Per-request ambient data as produced by the session resolver. Everything
/// here is optional: an anonymous visitor has no session at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub session: Option<Session>,
}

impl Context {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|s| s.user.as_ref())
    }
}

/// A session whose user is guaranteed present.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthedSession {
    pub user: User,
    pub expires: DateTime<Utc>,
}

/// AuthedContext
///
/// The narrowed context handed to every procedure behind `is_authed`. Handlers
/// taking this type never deal with a missing session or user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthedContext {
    pub session: AuthedSession,
}

impl AuthedContext {
    pub fn user(&self) -> &User {
        &self.session.user
    }
}

impl From<AuthedContext> for Context {
    fn from(ctx: AuthedContext) -> Self {
        Context::with_session(Session {
            user: Some(ctx.session.user),
            expires: ctx.session.expires,
        })
    }
}

impl TryFrom<Context> for AuthedContext {
    type Error = Context;

    /// Succeeds only when both the session and its user are present; hands the
    /// original context back otherwise.
    fn try_from(ctx: Context) -> Result<Self, Self::Error> {
        match ctx.session {
            Some(Session {
                user: Some(user),
                expires,
            }) => Ok(AuthedContext {
                session: AuthedSession { user, expires },
            }),
            session => Err(Context { session }),
        }
    }
}

/// ProcedureContext
///
/// What flows through a guard chain: either the context as resolved, or the
/// narrowed form once a guard has established authentication.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureContext {
    Anonymous(Context),
    Authed(AuthedContext),
}

impl ProcedureContext {
    pub fn user(&self) -> Option<&User> {
        match self {
            ProcedureContext::Anonymous(ctx) => ctx.user(),
            ProcedureContext::Authed(ctx) => Some(ctx.user()),
        }
    }

    pub fn is_authed(&self) -> bool {
        matches!(self, ProcedureContext::Authed(_))
    }
}

/// FromProcedureContext
///
/// Converts the guard chain's output into the context type a handler asked for.
/// Implemented for [`Context`] (any chain) and [`AuthedContext`] (chains that
/// start with `is_authed`).
pub trait FromProcedureContext: Sized + Send + 'static {
    fn from_procedure_context(ctx: ProcedureContext) -> Result<Self, RpcError>;
}

impl FromProcedureContext for Context {
    fn from_procedure_context(ctx: ProcedureContext) -> Result<Self, RpcError> {
        Ok(match ctx {
            ProcedureContext::Anonymous(ctx) => ctx,
            ProcedureContext::Authed(ctx) => ctx.into(),
        })
    }
}

impl FromProcedureContext for AuthedContext {
    fn from_procedure_context(ctx: ProcedureContext) -> Result<Self, RpcError> {
        match ctx {
            ProcedureContext::Authed(ctx) => Ok(ctx),
            ProcedureContext::Anonymous(ctx) => {
                AuthedContext::try_from(ctx).map_err(|_| RpcError::unauthorized())
            }
        }
    }
}
