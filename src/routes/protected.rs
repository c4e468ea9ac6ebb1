use crate::{
    context::AuthedContext,
    handlers,
    models::UpdateProfileInput,
    procedure::protected_procedure,
    repository::RepositoryState,
    router::RpcRouter,
};

/// Protected Router
///
/// Mounted under `user`. Every handler receives an `AuthedContext`.
pub fn protected_routes(repo: RepositoryState) -> RpcRouter {
    RpcRouter::new()
        // user.me (query)
        .procedure("me", protected_procedure().query(handlers::get_me))
        // user.updateProfile (mutation)
        // Validated input; a blank or overlong name is a BAD_REQUEST.
        .procedure(
            "updateProfile",
            protected_procedure().mutation(move |ctx: AuthedContext, input: UpdateProfileInput| {
                handlers::update_profile(repo.clone(), ctx, input)
            }),
        )
}
