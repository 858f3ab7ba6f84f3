use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts for.
///
/// Read from the `X-User-Id` header, falling back to the configured default
/// user. This identifies the caller; it does not authenticate them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| state.default_user_id.to_string());

        Ok(CurrentUser(user_id))
    }
}
