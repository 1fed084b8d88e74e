use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::ApiError;
use crate::models::{validate_title, CreateTodoRequest, Todo, UpdateTodoRequest};

// AUTOINCREMENT keeps rowids monotonic so deleted ids are never reused.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Persistence layer for todo rows. Cheap to clone; all clones share one
/// connection pool.
#[derive(Clone)]
pub struct TodoStore {
    pool: SqlitePool,
}

impl TodoStore {
    /// Opens the database and bootstraps the schema.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database exists per connection, so the pool must not
        // grow past a single one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn list(&self) -> Result<Vec<Todo>, ApiError> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT id, title, description, completed, created_at, updated_at \
             FROM todos ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(todos)
    }

    pub async fn get(&self, id: i64) -> Result<Todo, ApiError> {
        sqlx::query_as::<_, Todo>(
            "SELECT id, title, description, completed, created_at, updated_at \
             FROM todos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound)
    }

    pub async fn create(&self, input: CreateTodoRequest) -> Result<Todo, ApiError> {
        let title = input
            .title
            .as_deref()
            .ok_or_else(|| ApiError::validation("title", "This field is required."))?;
        validate_title(title)?;

        let now = Utc::now();
        let todo = sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (title, description, completed, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, title, description, completed, created_at, updated_at",
        )
        .bind(title)
        .bind(input.description.as_deref())
        .bind(input.completed.unwrap_or(false))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    /// Applies only the supplied fields, refreshes `updated_at` and leaves
    /// `created_at` untouched.
    pub async fn update(&self, id: i64, input: UpdateTodoRequest) -> Result<Todo, ApiError> {
        if let Some(title) = input.title.as_deref() {
            validate_title(title)?;
        }

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Todo>(
            "SELECT id, title, description, completed, created_at, updated_at \
             FROM todos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound)?;

        let title = input.title.unwrap_or(current.title);
        let description = input.description.unwrap_or(current.description);
        let completed = input.completed.unwrap_or(current.completed);
        let now = Utc::now();

        let todo = sqlx::query_as::<_, Todo>(
            "UPDATE todos SET title = ?, description = ?, completed = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, title, description, completed, created_at, updated_at",
        )
        .bind(&title)
        .bind(description.as_deref())
        .bind(completed)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(todo)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> TodoStore {
        TodoStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store")
    }

    fn create_request(title: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() {
        let store = store().await;

        let todo = store.create(create_request("Buy milk")).await.unwrap();

        assert_eq!(todo.id, 1);
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.description, None);
        assert!(!todo.completed);
        assert_eq!(todo.created_at, todo.updated_at);
    }

    #[tokio::test]
    async fn create_without_title_is_a_validation_error() {
        let store = store().await;

        let err = store.create(CreateTodoRequest::default()).await.unwrap_err();

        assert!(matches!(err, ApiError::Validation { field: "title", .. }));
    }

    #[tokio::test]
    async fn ids_are_unique_across_creates() {
        let store = store().await;

        let a = store.create(create_request("a")).await.unwrap();
        let b = store.create(create_request("b")).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = store().await;
        for title in ["first", "second", "third"] {
            store.create(create_request(title)).await.unwrap();
        }

        let todos = store.list().await.unwrap();

        let titles: Vec<&str> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn list_on_empty_store_is_empty() {
        let store = store().await;
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_applies_only_supplied_fields() {
        let store = store().await;
        let created = store.create(create_request("Buy milk")).await.unwrap();

        let updated = store
            .update(
                created.id,
                UpdateTodoRequest {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.title, "Buy milk");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_can_clear_description() {
        let store = store().await;
        let created = store
            .create(CreateTodoRequest {
                title: Some("Buy milk".to_string()),
                description: Some("two liters".to_string()),
                completed: None,
            })
            .await
            .unwrap();
        assert_eq!(created.description.as_deref(), Some("two liters"));

        let updated = store
            .update(
                created.id,
                UpdateTodoRequest {
                    description: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.description, None);
    }

    #[tokio::test]
    async fn update_rejects_oversized_title() {
        let store = store().await;
        let created = store.create(create_request("ok")).await.unwrap();

        let err = store
            .update(
                created.id,
                UpdateTodoRequest {
                    title: Some("a".repeat(201)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation { field: "title", .. }));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = store().await;

        let err = store
            .update(42, UpdateTodoRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = store().await;
        let created = store.create(create_request("Buy milk")).await.unwrap();

        store.delete(created.id).await.unwrap();

        assert!(matches!(
            store.get(created.id).await.unwrap_err(),
            ApiError::NotFound
        ));
        assert!(matches!(
            store.delete(created.id).await.unwrap_err(),
            ApiError::NotFound
        ));
    }
}
