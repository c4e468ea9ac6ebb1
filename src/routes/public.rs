use crate::{handlers, procedure::public_procedure, router::RpcRouter};

/// Public Router
///
/// Mounted under `auth`.
pub fn public_routes() -> RpcRouter {
    RpcRouter::new()
        // auth.getSession (query)
        // The caller's session, `null` when anonymous. Lets clients render
        // signed-in state without risking an UNAUTHORIZED error.
        .procedure("getSession", public_procedure().query(handlers::get_session))
}
