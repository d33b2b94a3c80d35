use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{Account, CredentialsRequest, SuccessResponse, TokenPair};
use crate::AppState;

/// Extract the bearer token from the Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::not_found("Missing authorization header"))?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ApiError::not_found("Invalid authorization header")),
    }
}

/// Pull username and password out of a credentials body
fn credentials(
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(String, String), ApiError> {
    let Json(request) = payload?;
    match (request.username, request.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Ok((username, password))
        }
        _ => Err(ApiError::bad_request("Missing username or password")),
    }
}

/// Register endpoint
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError> {
    let (username, password) = credentials(payload)?;
    let pair = state.sessions.register(&username, &password).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let (username, password) = credentials(payload)?;
    let pair = state.sessions.login(&username, &password).await?;
    Ok(Json(pair))
}

/// Exchange the refresh token in the Authorization header for a new pair
pub async fn reauthenticate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let refresh_token = extract_bearer(&headers)?;
    let pair = state.sessions.reauthenticate(&refresh_token).await?;
    Ok(Json(pair))
}

/// Delete the caller's account along with all of their plants
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    account: Account,
) -> Result<Json<SuccessResponse>, ApiError> {
    let removed = state.plants.remove_all(&account).await?;
    state.sessions.delete_account(account.id).await?;

    tracing::info!(account_id = account.id, plants = removed, "Account deleted by owner");
    Ok(Json(SuccessResponse::ok()))
}

/// Extractor for the account behind a session token
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Account {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)?;
        Ok(state.sessions.authorize(&token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(extract_bearer(&headers("Bearer  abc123 ")).unwrap(), "abc123");
    }

    #[test]
    fn test_extract_bearer_failures() {
        for value in ["Basic abc", "abc123", "Bearer ", "Bearer    "] {
            let err = extract_bearer(&headers(value)).unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{}", value);
        }
        let err = extract_bearer(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
