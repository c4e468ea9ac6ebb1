use crate::{
    context::AuthedContext, handlers, models::SetPermissionInput, procedure::admin_procedure,
    repository::RepositoryState, router::RpcRouter,
};

/// Admin Router
///
/// Mounted under `admin`. Reachable by ADMIN users only.
pub fn admin_routes(repo: RepositoryState) -> RpcRouter {
    RpcRouter::new()
        // admin.setPermission (mutation)
        // Promotes or demotes another user. Changing one's own tier is refused.
        .procedure(
            "setPermission",
            admin_procedure().mutation(move |ctx: AuthedContext, input: SetPermissionInput| {
                handlers::set_permission(repo.clone(), ctx, input)
            }),
        )
}
