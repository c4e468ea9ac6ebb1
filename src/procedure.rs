//! Procedure variants and the procedure builder.
//!
//! Every procedure is one of four tiers. A tier is nothing more than an ordered
//! guard list, and each tier extends the one below it by a single guard:
//!
//! | tier        | guards                       | handler context   |
//! |-------------|------------------------------|-------------------|
//! | `Public`    | none                         | [`Context`]       |
//! | `Protected` | `is_authed`                  | [`AuthedContext`] |
//! | `Moderator` | `is_authed`, `is_moderator`  | [`AuthedContext`] |
//! | `Admin`     | `is_authed`, `is_admin`      | [`AuthedContext`] |

use std::{future::Future, marker::PhantomData, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    context::{AuthedContext, Context, FromProcedureContext, ProcedureContext},
    error::{ErrorShape, RpcError, format_error},
    guards::{Guard, IS_ADMIN, IS_AUTHED, IS_MODERATOR},
    transformer::Transformer,
    validation::{Validate, parse_input},
};

const PUBLIC_GUARDS: &[Guard] = &[];
const PROTECTED_GUARDS: &[Guard] = &[IS_AUTHED];
const MODERATOR_GUARDS: &[Guard] = &[IS_AUTHED, IS_MODERATOR];
const ADMIN_GUARDS: &[Guard] = &[IS_AUTHED, IS_ADMIN];

/// Tier
///
/// The privilege tier a procedure is declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Public,
    Protected,
    Moderator,
    Admin,
}

impl Tier {
    pub fn guards(&self) -> &'static [Guard] {
        match self {
            Tier::Public => PUBLIC_GUARDS,
            Tier::Protected => PROTECTED_GUARDS,
            Tier::Moderator => MODERATOR_GUARDS,
            Tier::Admin => ADMIN_GUARDS,
        }
    }

    /// The tier this one was built from, if any.
    pub fn parent(&self) -> Option<Tier> {
        match self {
            Tier::Public => None,
            Tier::Protected => Some(Tier::Public),
            Tier::Moderator | Tier::Admin => Some(Tier::Protected),
        }
    }

    /// authorize
    ///
    /// Runs the tier's guards in declared order, stopping at the first rejection.
    pub fn authorize(&self, ctx: Context) -> Result<ProcedureContext, RpcError> {
        self.guards()
            .iter()
            .try_fold(ProcedureContext::Anonymous(ctx), |ctx, guard| guard.run(ctx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl ProcedureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        }
    }
}

type BoxedHandler =
    Arc<dyn Fn(ProcedureContext, Value) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// Procedure
///
/// A fully built, type-erased procedure: tier, kind and a handler that takes the
/// guarded context plus raw JSON input and returns raw JSON output.
#[derive(Clone)]
pub struct Procedure {
    tier: Tier,
    kind: ProcedureKind,
    handler: BoxedHandler,
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("tier", &self.tier)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Procedure {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    /// call
    ///
    /// Guards first; input parsing and the handler only run once every guard passed.
    pub async fn call(&self, ctx: Context, input: Value) -> Result<Value, RpcError> {
        let ctx = self.tier.authorize(ctx)?;
        (self.handler)(ctx, input).await
    }
}

/// ProcedureBuilder
///
/// Typed entry point for declaring procedures. `C` is the context type the
/// handler receives, fixed by the tier constructor.
pub struct ProcedureBuilder<C> {
    tier: Tier,
    _context: PhantomData<fn() -> C>,
}

impl<C> ProcedureBuilder<C> {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            _context: PhantomData,
        }
    }
}

pub fn public_procedure() -> ProcedureBuilder<Context> {
    ProcedureBuilder::new(Tier::Public)
}

pub fn protected_procedure() -> ProcedureBuilder<AuthedContext> {
    ProcedureBuilder::new(Tier::Protected)
}

pub fn moderator_procedure() -> ProcedureBuilder<AuthedContext> {
    ProcedureBuilder::new(Tier::Moderator)
}

pub fn admin_procedure() -> ProcedureBuilder<AuthedContext> {
    ProcedureBuilder::new(Tier::Admin)
}

impl<C: FromProcedureContext> ProcedureBuilder<C> {
    pub fn query<I, O, F, Fut>(self, handler: F) -> Procedure
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(C, I) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        self.build(ProcedureKind::Query, handler)
    }

    pub fn mutation<I, O, F, Fut>(self, handler: F) -> Procedure
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(C, I) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        self.build(ProcedureKind::Mutation, handler)
    }

    fn build<I, O, F, Fut>(self, kind: ProcedureKind, handler: F) -> Procedure
    where
        I: DeserializeOwned + Validate + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(C, I) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<O, RpcError>> + Send + 'static,
    {
        let handler: BoxedHandler = Arc::new(move |ctx: ProcedureContext, raw: Value| {
            let handler = handler.clone();
            async move {
                let ctx = C::from_procedure_context(ctx)?;
                let input = parse_input::<I>(raw)?;
                let output = handler(ctx, input).await?;
                serde_json::to_value(output)
                    .map_err(|e| RpcError::internal(format!("failed to serialize output: {}", e)))
            }
            .boxed()
        });

        Procedure {
            tier: self.tier,
            kind,
            handler,
        }
    }
}

/// RpcConfig
///
/// Process-wide procedure settings: the wire transformer and the error
/// formatter. Built once at startup and handed to the HTTP adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcConfig {
    pub transformer: Transformer,
}

impl RpcConfig {
    pub fn new(transformer: Transformer) -> Self {
        Self { transformer }
    }

    pub fn format_error(&self, error: &RpcError, path: Option<&str>) -> ErrorShape {
        format_error(error, path)
    }
}
