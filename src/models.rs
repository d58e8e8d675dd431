use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub subject: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Missing fields decode to zero values; the handlers validate them.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTodoRequest {
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTodoRequest {
    pub id: i64,
    pub subject: String,
    pub description: String,
}

/// Raw `prev_id` / `size` query values, parsed by the read handler.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadTodoParams {
    pub prev_id: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteTodoRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    pub todo: Todo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadTodoResponse {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct DeleteTodoResponse {}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub message: &'static str,
}
