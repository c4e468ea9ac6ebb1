use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tiered_rpc::{
    context::{AuthedContext, Context, ProcedureContext},
    error::{ErrorCode, RpcError},
    guards::{is_admin, is_authed, is_moderator},
    models::{Permission, Session, User},
    procedure::{
        Procedure, ProcedureKind, Tier, admin_procedure, moderator_procedure, protected_procedure,
        public_procedure,
    },
};
use uuid::Uuid;

// --- Helper Functions ---

fn user(permission: Permission) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", permission.as_str().to_lowercase()),
        name: None,
        permission,
    }
}

fn ctx_with(permission: Permission) -> Context {
    Context::with_session(Session {
        user: Some(user(permission)),
        expires: Utc::now() + Duration::hours(1),
    })
}

// A session that exists but carries no user.
fn ctx_without_user() -> Context {
    Context::with_session(Session {
        user: None,
        expires: Utc::now() + Duration::hours(1),
    })
}

/// One procedure per tier, each echoing the caller's email (or "anonymous").
fn procedures() -> Vec<(Tier, Procedure)> {
    vec![
        (
            Tier::Public,
            public_procedure().query(|ctx: Context, _: ()| async move {
                let email = ctx.user().map(|u| u.email.clone());
                Ok::<_, RpcError>(email.unwrap_or_else(|| "anonymous".to_string()))
            }),
        ),
        (Tier::Protected, protected_procedure().query(echo_email)),
        (Tier::Moderator, moderator_procedure().query(echo_email)),
        (Tier::Admin, admin_procedure().query(echo_email)),
    ]
}

async fn echo_email(ctx: AuthedContext, _input: ()) -> Result<String, RpcError> {
    Ok(ctx.user().email.clone())
}

async fn outcome(tier: Tier, ctx: Context) -> Result<Value, ErrorCode> {
    let (_, procedure) = procedures()
        .into_iter()
        .find(|(t, _)| *t == tier)
        .expect("tier registered");
    procedure.call(ctx, Value::Null).await.map_err(|e| e.code)
}

// --- Tier Properties ---

#[tokio::test]
async fn test_absent_session_is_unauthorized_for_guarded_tiers() {
    for tier in [Tier::Protected, Tier::Moderator, Tier::Admin] {
        assert_eq!(
            outcome(tier, Context::anonymous()).await,
            Err(ErrorCode::Unauthorized),
            "{:?} must reject anonymous callers",
            tier
        );
        assert_eq!(
            outcome(tier, ctx_without_user()).await,
            Err(ErrorCode::Unauthorized),
            "{:?} must reject a session without a user",
            tier
        );
    }
}

#[tokio::test]
async fn test_user_permission() {
    assert!(outcome(Tier::Protected, ctx_with(Permission::User)).await.is_ok());
    assert_eq!(
        outcome(Tier::Moderator, ctx_with(Permission::User)).await,
        Err(ErrorCode::Forbidden)
    );
    assert_eq!(
        outcome(Tier::Admin, ctx_with(Permission::User)).await,
        Err(ErrorCode::Forbidden)
    );
}

#[tokio::test]
async fn test_moderator_permission() {
    assert!(outcome(Tier::Protected, ctx_with(Permission::Moderator)).await.is_ok());
    assert_eq!(
        outcome(Tier::Moderator, ctx_with(Permission::Moderator)).await,
        Ok(json!("moderator@example.com"))
    );
    assert_eq!(
        outcome(Tier::Admin, ctx_with(Permission::Moderator)).await,
        Err(ErrorCode::Forbidden)
    );
}

#[tokio::test]
async fn test_admin_permission_passes_moderator_and_admin() {
    assert_eq!(
        outcome(Tier::Moderator, ctx_with(Permission::Admin)).await,
        Ok(json!("admin@example.com"))
    );
    assert_eq!(
        outcome(Tier::Admin, ctx_with(Permission::Admin)).await,
        Ok(json!("admin@example.com"))
    );
}

#[tokio::test]
async fn test_public_succeeds_with_or_without_session() {
    assert_eq!(
        outcome(Tier::Public, Context::anonymous()).await,
        Ok(json!("anonymous"))
    );
    assert_eq!(
        outcome(Tier::Public, ctx_without_user()).await,
        Ok(json!("anonymous"))
    );
    assert_eq!(
        outcome(Tier::Public, ctx_with(Permission::User)).await,
        Ok(json!("user@example.com"))
    );
}

#[tokio::test]
async fn test_guard_rejection_skips_handler() {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let procedure = admin_procedure().mutation(move |_ctx: AuthedContext, _: ()| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RpcError>(())
        }
    });

    let err = procedure
        .call(ctx_with(Permission::Moderator), Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    procedure
        .call(ctx_with(Permission::Admin), Value::Null)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_guards_run_before_input_validation() {
    let procedure = protected_procedure()
        .mutation(|_ctx: AuthedContext, n: u32| async move { Ok::<_, RpcError>(n + 1) });

    // Bad input from an anonymous caller: the guard answers first.
    let err = procedure
        .call(Context::anonymous(), json!("not a number"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let err = procedure
        .call(ctx_with(Permission::User), json!("not a number"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
    assert!(err.validation_error().is_some());

    assert_eq!(
        procedure.call(ctx_with(Permission::User), json!(41)).await.unwrap(),
        json!(42)
    );
}

// --- Tier Composition ---

#[test]
fn test_each_tier_extends_its_parent_by_one_guard() {
    for tier in [Tier::Protected, Tier::Moderator, Tier::Admin] {
        let parent = tier.parent().expect("non-public tiers have a parent");
        let names: Vec<_> = tier.guards().iter().map(|g| g.name()).collect();
        let parent_names: Vec<_> = parent.guards().iter().map(|g| g.name()).collect();

        assert_eq!(names.len(), parent_names.len() + 1);
        assert_eq!(&names[..parent_names.len()], parent_names.as_slice());
    }

    assert!(Tier::Public.guards().is_empty());
    assert_eq!(
        Tier::Moderator.guards().iter().map(|g| g.name()).collect::<Vec<_>>(),
        vec!["is_authed", "is_moderator"]
    );
    assert_eq!(
        Tier::Admin.guards().iter().map(|g| g.name()).collect::<Vec<_>>(),
        vec!["is_authed", "is_admin"]
    );
}

#[test]
fn test_procedure_records_tier_and_kind() {
    let procedure = moderator_procedure().mutation(echo_email);
    assert_eq!(procedure.tier(), Tier::Moderator);
    assert_eq!(procedure.kind(), ProcedureKind::Mutation);
}

// --- Guards In Isolation ---

#[test]
fn test_is_authed_narrows_context() {
    let ctx = ctx_with(Permission::User);
    let email = ctx.user().unwrap().email.clone();

    match is_authed(ProcedureContext::Anonymous(ctx)).unwrap() {
        ProcedureContext::Authed(authed) => assert_eq!(authed.session.user.email, email),
        other => panic!("expected narrowed context, got {:?}", other),
    }
}

#[test]
fn test_is_authed_rejects_missing_user() {
    let err = is_authed(ProcedureContext::Anonymous(ctx_without_user())).unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);
    assert_eq!(err.message, "UNAUTHORIZED");
}

#[test]
fn test_permission_guards_without_session_are_forbidden() {
    for guard in [is_moderator, is_admin] {
        let err = guard(ProcedureContext::Anonymous(Context::anonymous())).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        let err = guard(ProcedureContext::Anonymous(ctx_without_user())).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}

#[test]
fn test_is_moderator_is_inclusive_of_admin() {
    for permission in [Permission::Moderator, Permission::Admin] {
        let ctx = is_moderator(ProcedureContext::Anonymous(ctx_with(permission))).unwrap();
        assert!(ctx.is_authed());
    }
}

#[test]
fn test_is_admin_requires_exact_admin() {
    assert!(is_admin(ProcedureContext::Anonymous(ctx_with(Permission::Admin))).is_ok());
    for permission in [Permission::User, Permission::Moderator] {
        let err = is_admin(ProcedureContext::Anonymous(ctx_with(permission))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }
}

#[test]
fn test_permission_order() {
    assert!(Permission::User < Permission::Moderator);
    assert!(Permission::Moderator < Permission::Admin);
}
