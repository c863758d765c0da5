//! Persistence seam. Handlers and the auth gate only see [`Store`]; the
//! PostgreSQL and in-memory backends are interchangeable behind it.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    auth::{
        password::Credential,
        repo_types::{TokenRow, User},
    },
    todos::repo_types::{NewTodo, Todo, TodoChanges, TodoFilter},
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, email: &str, credential: &Credential) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    // token ledger
    async fn insert_token(&self, token_hash: &str) -> Result<TokenRow, StoreError>;
    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRow>, StoreError>;
    /// Returns whether a row was actually removed.
    async fn delete_token(&self, id: i64) -> Result<bool, StoreError>;

    // todos, always scoped by owner
    async fn list_todos(&self, user_id: i64, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError>;
    async fn find_todo(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError>;
    async fn create_todo(&self, user_id: i64, new: &NewTodo) -> Result<Todo, StoreError>;
    async fn update_todo(
        &self,
        user_id: i64,
        id: i64,
        changes: &TodoChanges,
    ) -> Result<Option<Todo>, StoreError>;
    async fn delete_todo(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;
}
