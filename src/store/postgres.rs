use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use super::{Store, StoreError};
use crate::{
    auth::{
        password::Credential,
        repo_types::{TokenRow, User},
    },
    todos::repo_types::{NewTodo, Todo, TodoChanges, TodoFilter},
};

const USER_COLUMNS: &str = "id, email, salt, password_hash, created_at, updated_at";
const TODO_COLUMNS: &str = "id, description, completed, user_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn map_unique_email(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, email: &str, credential: &Credential) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, salt, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(&credential.salt)
        .bind(&credential.hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_email)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_token(&self, token_hash: &str) -> Result<TokenRow, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            INSERT INTO tokens (token_hash)
            VALUES ($1)
            RETURNING id, token_hash, created_at, updated_at
            "#,
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRow>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, token_hash, created_at, updated_at
            FROM tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_token(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_todos(&self, user_id: i64, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {TODO_COLUMNS} FROM todos WHERE user_id = "));
        qb.push_bind(user_id);
        if let Some(completed) = filter.completed {
            qb.push(" AND completed = ").push_bind(completed);
        }
        if let Some(q) = &filter.q {
            // strpos keeps `%` and `_` in the needle literal
            qb.push(" AND strpos(description, ")
                .push_bind(q.clone())
                .push(") > 0");
        }
        qb.push(" ORDER BY id");

        let rows = qb.build_query_as::<Todo>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn find_todo(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn create_todo(&self, user_id: i64, new: &NewTodo) -> Result<Todo, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"
            INSERT INTO todos (user_id, description, completed)
            VALUES ($1, $2, $3)
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.description)
        .bind(new.completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn update_todo(
        &self,
        user_id: i64,
        id: i64,
        changes: &TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"
            UPDATE todos
               SET description = COALESCE($3, description),
                   completed   = COALESCE($4, completed),
                   updated_at  = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(changes.description.as_deref())
        .bind(changes.completed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn delete_todo(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
