use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    context::Context,
    error::RpcError,
    procedure::{Procedure, ProcedureKind},
};

/// RpcRouter
///
/// Flat registry of procedures keyed by dotted path (`user.me`,
/// `admin.setPermission`). Sub-routers are folded in with [`RpcRouter::nest`]
/// and [`RpcRouter::merge`].
#[derive(Debug, Clone, Default)]
pub struct RpcRouter {
    procedures: BTreeMap<String, Procedure>,
}

impl RpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `procedure` at `path`.
    ///
    /// # Panics
    /// Panics if `path` is already taken. Router assembly happens at startup,
    /// so a clash is a programming error.
    pub fn procedure(mut self, path: &str, procedure: Procedure) -> Self {
        self.insert(path.to_string(), procedure);
        self
    }

    /// Mounts every procedure of `router` under `prefix.`.
    pub fn nest(mut self, prefix: &str, router: RpcRouter) -> Self {
        for (path, procedure) in router.procedures {
            self.insert(format!("{}.{}", prefix, path), procedure);
        }
        self
    }

    pub fn merge(mut self, router: RpcRouter) -> Self {
        for (path, procedure) in router.procedures {
            self.insert(path, procedure);
        }
        self
    }

    fn insert(&mut self, path: String, procedure: Procedure) {
        assert!(
            !self.procedures.contains_key(&path),
            "duplicate procedure path `{}`",
            path
        );
        self.procedures.insert(path, procedure);
    }

    /// Registered paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    /// call
    ///
    /// Resolves `path` to a procedure of the requested kind and invokes it.
    /// An unknown path and a kind mismatch are both `NOT_FOUND`.
    pub async fn call(
        &self,
        kind: ProcedureKind,
        path: &str,
        ctx: Context,
        input: Value,
    ) -> Result<Value, RpcError> {
        match self.procedures.get(path) {
            Some(procedure) if procedure.kind() == kind => procedure.call(ctx, input).await,
            _ => Err(RpcError::not_found(format!(
                "No \"{}\"-procedure on path \"{}\"",
                kind.as_str(),
                path
            ))),
        }
    }
}
