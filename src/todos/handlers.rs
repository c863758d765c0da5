use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, info, instrument};

use super::{
    dto::{parse_id, CreateTodoRequest, ListQuery, UpdateTodoRequest},
    repo_types::{NewTodo, Todo, TodoChanges},
};
use crate::{auth::extractors::Authenticated, error::ApiError, state::AppState};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
}

#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    ListQuery(filter): ListQuery,
    auth: Authenticated,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state.store.list_todos(auth.user.id, &filter).await?;
    if todos.is_empty() {
        debug!("no todos matched");
        return Err(ApiError::NotFound);
    }
    Ok(Json(todos))
}

#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Authenticated,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .find_todo(auth.user.id, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[instrument(skip(state, auth, body), fields(user_id = auth.user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    auth: Authenticated,
    body: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let new = NewTodo::try_from(body)?;
    let todo = state.store.create_todo(auth.user.id, &new).await?;
    info!(todo_id = todo.id, "todo created");
    Ok(Json(todo))
}

#[instrument(skip(state, auth, body), fields(user_id = auth.user.id))]
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Authenticated,
    body: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let changes = TodoChanges::try_from(body)?;
    let todo = state
        .store
        .update_todo(auth.user.id, id, &changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(todo_id = todo.id, "todo updated");
    Ok(Json(todo))
}

#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Authenticated,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete_todo(auth.user.id, id).await? {
        return Err(ApiError::NotFound);
    }
    info!(todo_id = id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
