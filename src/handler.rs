use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::TodoError;
use crate::middleware;
use crate::models::{
    CreateTodoRequest, DeleteTodoRequest, DeleteTodoResponse, HealthzResponse, ReadTodoParams,
    ReadTodoResponse, TodoResponse, UpdateTodoRequest,
};
use crate::service::TodoService;

#[derive(Clone)]
pub struct AppState {
    service: TodoService,
}

pub fn router(service: TodoService) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/todos",
            get(read_todos)
                .post(create_todo)
                .put(update_todo)
                .delete(delete_todos),
        )
        .layer(middleware::recovery())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { message: "OK" })
}

async fn create_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoResponse>, TodoError> {
    let req: CreateTodoRequest = decode(&body)?;
    if req.subject.is_empty() {
        return Err(TodoError::MissingSubject);
    }

    let todo = state.service.create_todo(req.subject, req.description).await?;
    Ok(Json(TodoResponse { todo }))
}

async fn update_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoResponse>, TodoError> {
    let req: UpdateTodoRequest = decode(&body)?;
    if req.subject.is_empty() {
        return Err(TodoError::MissingSubject);
    }

    let todo = state
        .service
        .update_todo(req.id, req.subject, req.description)
        .await?;
    Ok(Json(TodoResponse { todo }))
}

async fn read_todos(
    State(state): State<AppState>,
    Query(params): Query<ReadTodoParams>,
) -> Result<Json<ReadTodoResponse>, TodoError> {
    let prev_id = parse_param("prev_id", params.prev_id.as_deref())?;
    let size = parse_param("size", params.size.as_deref())?;

    let todos = state.service.read_todos(prev_id, size).await?;
    Ok(Json(ReadTodoResponse { todos }))
}

async fn delete_todos(State(state): State<AppState>, body: Bytes) -> Response {
    let req: DeleteTodoRequest = match decode(&body) {
        Ok(req) => req,
        Err(err) => return err.into_response(),
    };
    if req.ids.is_empty() {
        return TodoError::Validation("No Items".to_string()).into_response();
    }

    match state.service.delete_todos(&req.ids).await {
        Ok(()) => Json(DeleteTodoResponse {}).into_response(),
        // Delete reports store failures as a bad request rather than a 500.
        Err(TodoError::Store(err)) => {
            warn!(error = %err, "delete failed");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, TodoError> {
    serde_json::from_slice(body).map_err(|err| TodoError::Validation(err.to_string()))
}

/// Absent or empty values mean 0.
fn parse_param(name: &str, value: Option<&str>) -> Result<i64, TodoError> {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return Ok(0);
    };
    let parsed: i64 = raw
        .parse()
        .map_err(|err| TodoError::Validation(format!("invalid {name} {raw:?}: {err}")))?;
    if parsed < 0 {
        return Err(TodoError::Validation(format!("{name} must not be negative")));
    }
    Ok(parsed)
}
