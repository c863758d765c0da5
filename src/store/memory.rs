use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::{
    auth::{
        password::Credential,
        repo_types::{TokenRow, User},
    },
    todos::repo_types::{NewTodo, Todo, TodoChanges, TodoFilter},
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tokens: BTreeMap<i64, TokenRow>,
    todos: BTreeMap<i64, Todo>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used when no `DATABASE_URL` is configured and in tests.
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, email: &str, credential: &Credential) -> Result<User, StoreError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: t.next_id(),
            email: email.to_string(),
            salt: credential.salt.clone(),
            password_hash: credential.hash.clone(),
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_token(&self, token_hash: &str) -> Result<TokenRow, StoreError> {
        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let row = TokenRow {
            id: t.next_id(),
            token_hash: token_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.tokens.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRow>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.tokens.values().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn delete_token(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.tokens.remove(&id).is_some())
    }

    async fn list_todos(&self, user_id: i64, filter: &TodoFilter) -> Result<Vec<Todo>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.todos
            .values()
            .filter(|todo| todo.user_id == user_id && filter.matches(todo))
            .cloned()
            .collect())
    }

    async fn find_todo(&self, user_id: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.todos.get(&id).filter(|todo| todo.user_id == user_id).cloned())
    }

    async fn create_todo(&self, user_id: i64, new: &NewTodo) -> Result<Todo, StoreError> {
        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let todo = Todo {
            id: t.next_id(),
            description: new.description.clone(),
            completed: new.completed,
            user_id,
            created_at: now,
            updated_at: now,
        };
        t.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn update_todo(
        &self,
        user_id: i64,
        id: i64,
        changes: &TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        let mut t = self.tables.write().await;
        let Some(todo) = t.todos.get_mut(&id).filter(|todo| todo.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(description) = &changes.description {
            todo.description = description.clone();
        }
        if let Some(completed) = changes.completed {
            todo.completed = completed;
        }
        todo.updated_at = OffsetDateTime::now_utc();
        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        if t.todos.get(&id).is_some_and(|todo| todo.user_id == user_id) {
            t.todos.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            salt: "salt".into(),
            hash: "hash".into(),
        }
    }

    fn new_todo(description: &str, completed: bool) -> NewTodo {
        NewTodo {
            description: description.into(),
            completed,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_user("a@example.com", &credential()).await.unwrap();
        let err = store
            .create_user("a@example.com", &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn todos_are_scoped_by_owner() {
        let store = MemoryStore::new();
        let mine = store.create_todo(1, &new_todo("mine", false)).await.unwrap();
        let theirs = store.create_todo(2, &new_todo("theirs", false)).await.unwrap();

        assert!(store.find_todo(1, theirs.id).await.unwrap().is_none());
        assert!(store
            .update_todo(1, theirs.id, &TodoChanges::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_todo(1, theirs.id).await.unwrap());

        let listed = store.list_todos(1, &TodoFilter::default()).await.unwrap();
        assert_eq!(listed, vec![mine]);
    }

    #[tokio::test]
    async fn list_applies_completed_and_substring_filters() {
        let store = MemoryStore::new();
        store.create_todo(1, &new_todo("walk the dog", false)).await.unwrap();
        store.create_todo(1, &new_todo("feed the dog", true)).await.unwrap();
        store.create_todo(1, &new_todo("buy milk", true)).await.unwrap();

        let filter = TodoFilter {
            completed: Some(true),
            q: Some("dog".into()),
        };
        let listed = store.list_todos(1, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "feed the dog");
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let store = MemoryStore::new();
        let todo = store.create_todo(7, &new_todo("draft", false)).await.unwrap();
        let changes = TodoChanges {
            description: None,
            completed: Some(true),
        };
        let updated = store.update_todo(7, todo.id, &changes).await.unwrap().unwrap();
        assert_eq!(updated.description, "draft");
        assert!(updated.completed);
    }

    #[tokio::test]
    async fn delete_token_reports_missing_rows() {
        let store = MemoryStore::new();
        let row = store.insert_token("abc").await.unwrap();
        assert!(store.delete_token(row.id).await.unwrap());
        assert!(!store.delete_token(row.id).await.unwrap());
        assert!(store.find_token("abc").await.unwrap().is_none());
    }
}
