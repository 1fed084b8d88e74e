use axum::extract::{FromRequest, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{CreateTodoRequest, Todo, UpdateTodoRequest};
use crate::store::TodoStore;

/// `axum::Json` with its rejection routed through [`ApiError`], so malformed
/// bodies come back as a 400 with the usual JSON error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthBody { status: "ok" }))
}

pub async fn list_todos(State(store): State<TodoStore>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = store.list().await?;
    Ok(Json(todos))
}

pub async fn get_todo(
    State(store): State<TodoStore>,
    Path(id): Path<i64>,
) -> Result<Json<Todo>, ApiError> {
    let todo = store.get(id).await?;
    Ok(Json(todo))
}

pub async fn create_todo(
    State(store): State<TodoStore>,
    AppJson(input): AppJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let todo = store.create(input).await?;
    tracing::info!(id = todo.id, "Todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(store): State<TodoStore>,
    Path(id): Path<i64>,
    AppJson(input): AppJson<UpdateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let todo = store.update(id, input).await?;
    tracing::info!(id = todo.id, "Todo updated");
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(store): State<TodoStore>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    store.delete(id).await?;
    tracing::info!(id, "Todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
