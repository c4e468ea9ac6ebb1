use crate::{
    context::{AuthedContext, Context},
    error::RpcError,
    models::{Session, SetPermissionInput, UpdateProfileInput, User},
    repository::RepositoryState,
    validation::{Issue, Validate, ValidationError},
};

const MAX_NAME_LEN: usize = 64;

impl Validate for UpdateProfileInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        let mut issues = Vec::new();
        if name.is_empty() {
            issues.push(Issue::new(&["name"], "Name must not be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            issues.push(Issue::new(
                &["name"],
                format!("Name must contain at most {} characters", MAX_NAME_LEN),
            ));
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }
}

impl Validate for SetPermissionInput {}

// --- Handlers ---

/// get_session
///
/// [Public] The caller's session, or `null` for anonymous callers.
pub async fn get_session(ctx: Context, _input: ()) -> Result<Option<Session>, RpcError> {
    Ok(ctx.session)
}

/// get_me
///
/// [Protected] The authenticated user.
pub async fn get_me(ctx: AuthedContext, _input: ()) -> Result<User, RpcError> {
    Ok(ctx.session.user)
}

/// update_profile
///
/// [Protected] Sets the caller's display name. Input is trimmed and validated
/// (non-empty, bounded length) before the handler runs.
pub async fn update_profile(
    repo: RepositoryState,
    ctx: AuthedContext,
    input: UpdateProfileInput,
) -> Result<User, RpcError> {
    let user_id = ctx.user().id;
    repo.update_name(user_id, input.name.trim().to_string())
        .await
        .ok_or_else(|| RpcError::not_found(format!("User {} not found", user_id)))
}

/// list_users
///
/// [Moderator] Every user, highest permission first.
pub async fn list_users(
    repo: RepositoryState,
    _ctx: AuthedContext,
    _input: (),
) -> Result<Vec<User>, RpcError> {
    Ok(repo.list_users().await)
}

/// set_permission
///
/// [Admin] Changes another user's permission tier. Admins cannot change their
/// own tier, so the last admin can never lock themselves out.
pub async fn set_permission(
    repo: RepositoryState,
    ctx: AuthedContext,
    input: SetPermissionInput,
) -> Result<User, RpcError> {
    if input.user_id == ctx.user().id {
        return Err(RpcError::bad_request("Cannot change your own permission"));
    }

    let user = repo
        .set_permission(input.user_id, input.permission)
        .await
        .ok_or_else(|| RpcError::not_found(format!("User {} not found", input.user_id)))?;

    tracing::info!(
        actor = %ctx.user().id,
        target = %user.id,
        permission = user.permission.as_str(),
        "permission changed"
    );
    Ok(user)
}
