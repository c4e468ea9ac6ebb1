use crate::{
    context::AuthedContext, handlers, procedure::moderator_procedure,
    repository::RepositoryState, router::RpcRouter,
};

/// Moderator Router
///
/// Mounted under `moderation`. Reachable by MODERATOR and ADMIN users.
pub fn moderator_routes(repo: RepositoryState) -> RpcRouter {
    RpcRouter::new()
        // moderation.listUsers (query)
        .procedure(
            "listUsers",
            moderator_procedure().query(move |ctx: AuthedContext, input: ()| {
                handlers::list_users(repo.clone(), ctx, input)
            }),
        )
}
