use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        codec::AUTHENTICATION,
        dto::{LoginRequest, PublicUser, RegisterRequest},
        extractors::{Authenticated, AUTH_HEADER},
        password::{check_password_policy, derive_credential, verify_password},
    },
    error::ApiError,
    state::AppState,
    store::StoreError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login).delete(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("invalid email"));
    }
    check_password_policy(&payload.password).map_err(ApiError::Validation)?;

    let credential = derive_credential(&payload.password).map_err(|e| {
        error!(error = %e, "derive_credential failed");
        ApiError::Internal(e.to_string())
    })?;

    let user = match state.store.create_user(&email, &credential).await {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => {
            warn!(email = %email, "email already registered");
            return Err(ApiError::validation("email already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(Json(user.into()))
}

/// Every failure here is a bare 401, including malformed bodies and
/// issuance problems; the log carries the real cause.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "login body rejected");
        ApiError::Unauthorized
    })?;
    let email = normalize_email(&payload.email);

    let user = match state.store.find_user_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login unknown email");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => {
            error!(error = %e, "find_user_by_email failed");
            return Err(ApiError::Unauthorized);
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!(email = %email, user_id = user.id, "login invalid password");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => {
            error!(error = %e, user_id = user.id, "verify_password failed");
            return Err(ApiError::Unauthorized);
        }
    }

    let token = state.codec.issue(user.id, AUTHENTICATION).map_err(|e| {
        error!(error = %e, user_id = user.id, "token issue failed");
        ApiError::Unauthorized
    })?;
    state.ledger.record(&token).await.map_err(|e| {
        error!(error = %e, user_id = user.id, "token record failed");
        ApiError::Unauthorized
    })?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(([(AUTH_HEADER, token)], Json(PublicUser::from(user))))
}

#[instrument(skip(state, auth), fields(user_id = auth.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<StatusCode, ApiError> {
    state.ledger.revoke(&auth.token).await?;
    info!("user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@example.com"));
        assert!(!is_valid_email("a@example"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Foo@Example.COM "), "foo@example.com");
    }

    #[test]
    fn public_user_serializes_only_public_fields() {
        let user = crate::auth::repo_types::User {
            id: 3,
            email: "test@example.com".into(),
            salt: "salt".into(),
            password_hash: "hash".into(),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 3,
                "email": "test@example.com",
                "createdAt": "1970-01-01T00:00:00Z",
                "updatedAt": "1970-01-01T00:00:00Z",
            })
        );
    }
}
