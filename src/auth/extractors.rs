use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};

use super::{
    codec::AUTHENTICATION,
    repo_types::{TokenRow, User},
};
use crate::{error::ApiError, state::AppState};

/// Header carrying the bearer token, both on login responses and on requests.
pub const AUTH_HEADER: &str = "Auth";

/// Caller identity for protected routes: the resolved user plus the ledger
/// row of the token they presented (needed for logout).
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub token: TokenRow,
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTH_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        let token = match state.ledger.is_valid(bearer).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!("token not in ledger");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => {
                warn!(error = %e, "ledger lookup failed");
                return Err(ApiError::Unauthorized);
            }
        };

        let payload = state.codec.decode(bearer).map_err(|e| {
            warn!(error = %e, token_id = token.id, "ledger token failed to decode");
            ApiError::Unauthorized
        })?;

        if payload.purpose != AUTHENTICATION {
            warn!(purpose = %payload.purpose, "token purpose is not authentication");
            return Err(ApiError::Unauthorized);
        }

        let user = match state.store.find_user_by_id(payload.id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = payload.id, "token refers to unknown user");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => {
                warn!(error = %e, "user lookup failed");
                return Err(ApiError::Unauthorized);
            }
        };

        Ok(Authenticated { user, token })
    }
}
