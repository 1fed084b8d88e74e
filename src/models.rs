use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;

pub const MAX_TITLE_LEN: usize = 200;

/// A persisted todo row. `id`, `created_at` and `updated_at` are assigned
/// by the store and never taken from request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /todos`. Unknown fields are ignored; a missing title is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Body of `PUT`/`PATCH /todos/{id}`. Every field is optional; absent
/// fields are left untouched. `description` distinguishes "absent" from
/// an explicit `null` (which clears it).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

// Serde folds `null` into a missing outer Option, so the inner value has
// to be captured while the field is present.
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

pub fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("title", "This field may not be blank."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation(
            "title",
            "Ensure this field has no more than 200 characters.",
        ));
    }
    Ok(())
}
