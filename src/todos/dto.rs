use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use super::repo_types::{NewTodo, TodoChanges, TodoFilter};
use crate::error::ApiError;

pub const MAX_DESCRIPTION_LEN: usize = 250;

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub description: Option<String>,
    pub completed: Option<bool>,
}

fn check_description(description: &str) -> Result<(), ApiError> {
    if description.trim().is_empty() {
        return Err(ApiError::validation("description must not be empty"));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

impl TryFrom<CreateTodoRequest> for NewTodo {
    type Error = ApiError;

    fn try_from(req: CreateTodoRequest) -> Result<Self, Self::Error> {
        check_description(&req.description)?;
        Ok(NewTodo {
            description: req.description,
            completed: req.completed,
        })
    }
}

impl TryFrom<UpdateTodoRequest> for TodoChanges {
    type Error = ApiError;

    fn try_from(req: UpdateTodoRequest) -> Result<Self, Self::Error> {
        if let Some(description) = &req.description {
            check_description(description)?;
        }
        Ok(TodoChanges {
            description: req.description,
            completed: req.completed,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawListQuery {
    completed: Option<String>,
    q: Option<String>,
}

/// `?completed=true|false&q=...`. Runs before authentication so a bad
/// `completed` value is a 400 whatever the token.
#[derive(Debug)]
pub struct ListQuery(pub TodoFilter);

impl ListQuery {
    fn parse(raw: RawListQuery) -> Result<Self, ApiError> {
        let completed = match raw.completed.as_deref() {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => {
                return Err(ApiError::validation(format!(
                    "completed must be \"true\" or \"false\", got {other:?}"
                )))
            }
        };
        let q = raw.q.filter(|q| !q.is_empty());
        Ok(ListQuery(TodoFilter { completed, q }))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawListQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        ListQuery::parse(raw)
    }
}

/// Ids that do not parse can never match a row, so they read as not found.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(completed: Option<&str>, q: Option<&str>) -> RawListQuery {
        RawListQuery {
            completed: completed.map(Into::into),
            q: q.map(Into::into),
        }
    }

    #[test]
    fn completed_accepts_only_literal_booleans() {
        assert_eq!(ListQuery::parse(raw(Some("true"), None)).unwrap().0.completed, Some(true));
        assert_eq!(ListQuery::parse(raw(Some("false"), None)).unwrap().0.completed, Some(false));
        assert_eq!(ListQuery::parse(raw(None, None)).unwrap().0.completed, None);
        for bad in ["maybe", "TRUE", "1", ""] {
            assert!(matches!(
                ListQuery::parse(raw(Some(bad), None)),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn empty_q_is_ignored() {
        assert_eq!(ListQuery::parse(raw(None, Some(""))).unwrap().0.q, None);
        assert_eq!(
            ListQuery::parse(raw(None, Some("milk"))).unwrap().0.q.as_deref(),
            Some("milk")
        );
    }

    #[test]
    fn description_rules() {
        let ok = CreateTodoRequest {
            description: "buy milk".into(),
            completed: false,
        };
        assert!(NewTodo::try_from(ok).is_ok());

        let blank = CreateTodoRequest {
            description: "   ".into(),
            completed: false,
        };
        assert!(NewTodo::try_from(blank).is_err());

        let long = UpdateTodoRequest {
            description: Some("x".repeat(MAX_DESCRIPTION_LEN + 1)),
            completed: None,
        };
        assert!(TodoChanges::try_from(long).is_err());
    }

    #[test]
    fn non_numeric_ids_are_not_found() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound)));
    }
}
