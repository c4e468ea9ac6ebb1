use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use uuid::Uuid;

/// Permission
///
/// The privilege tier attached to every user. Variants are declared in ascending
/// order, so the derived `Ord` gives the lattice `USER < MODERATOR < ADMIN`.
/// Stored in Postgres as the `permission` enum type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
    sqlx::Type, Default,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "permission", rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Permission {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::User => "USER",
            Permission::Moderator => "MODERATOR",
            Permission::Admin => "ADMIN",
        }
    }
}

/// User
///
/// A user record from the `users` table, as loaded by the session resolver.
/// Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // Display name; optional until the user sets it.
    pub name: Option<String>,
    pub permission: Permission,
}

/// Session
///
/// The session as produced by the resolver. A session can exist without a user
/// (e.g. a valid token whose account has since been removed), which is why
/// `user` stays optional here and only becomes mandatory after `is_authed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub user: Option<User>,
    #[ts(type = "string")]
    pub expires: DateTime<Utc>,
}

// --- Procedure Inputs ---

/// Input for `user.updateProfile`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProfileInput {
    pub name: String,
}

/// Input for `admin.setPermission`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SetPermissionInput {
    pub user_id: Uuid,
    pub permission: Permission,
}
