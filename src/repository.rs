use crate::models::{Permission, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// UserRepository
///
/// Persistence contract for the user records behind sessions. Handlers and the
/// session resolver only see this trait, so tests swap in [`InMemoryRepository`].
///
/// Lookups report failure as absence; the Postgres implementation logs the
/// underlying error.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn list_users(&self) -> Vec<User>;
    // Returns the updated user, or None if no user has this id.
    async fn update_name(&self, id: Uuid, name: String) -> Option<User>;
    async fn set_permission(&self, id: Uuid, permission: Permission) -> Option<User>;
}

pub type RepositoryState = Arc<dyn UserRepository>;

/// PostgresRepository
///
/// Expects a `users (id uuid, email text, name text null, permission permission)`
/// table, where `permission` is a Postgres enum of `USER`, `MODERATOR`, `ADMIN`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, name, permission FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn list_users(&self) -> Vec<User> {
        match sqlx::query_as::<_, User>(
            "SELECT id, email, name, permission FROM users ORDER BY permission DESC, email ASC",
        )
        .fetch_all(&self.pool)
        .await
        {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("list_users error: {:?}", e);
                vec![]
            }
        }
    }

    async fn update_name(&self, id: Uuid, name: String) -> Option<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2 WHERE id = $1 RETURNING id, email, name, permission",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_name error: {:?}", e);
            None
        })
    }

    async fn set_permission(&self, id: Uuid, permission: Permission) -> Option<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET permission = $2 WHERE id = $1 RETURNING id, email, name, permission",
        )
        .bind(id)
        .bind(permission)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("set_permission error: {:?}", e);
            None
        })
    }
}

/// InMemoryRepository
///
/// Process-local user store. Used by the test suite and when no `DATABASE_URL`
/// is configured outside production.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| {
            b.permission
                .cmp(&a.permission)
                .then_with(|| a.email.cmp(&b.email))
        });
        users
    }

    async fn update_name(&self, id: Uuid, name: String) -> Option<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        user.name = Some(name);
        Some(user.clone())
    }

    async fn set_permission(&self, id: Uuid, permission: Permission) -> Option<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        user.permission = permission;
        Some(user.clone())
    }
}
