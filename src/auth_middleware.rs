// Request authentication. The browser carries a backend-issued bearer token
// (Authorization header, or the authToken cookie set at login); we forward
// it to the backend's identity endpoint and cache the answer briefly.
//
// Admin access is one centralized gate: a probe of the admin stats endpoint
// with the caller's token. 200 means admin (and the stats come along for
// free), 401 redirects to the admin login, 403 stays an inline refusal.

use axum::{
    RequestPartsExt, async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{AppState, api_client::ApiError, error::AppError, models::{CurrentUser, ReportStats}};

const IDENTITY_TTL: Duration = Duration::from_secs(60);

struct CachedIdentity {
    user: CurrentUser,
    fetched: Instant,
}

// One process-wide identity cache keyed by token, so every page does not
// re-probe the backend on each request.
static IDENTITY_CACHE: Lazy<tokio::sync::RwLock<HashMap<String, CachedIdentity>>> =
    Lazy::new(|| tokio::sync::RwLock::new(HashMap::new()));

/// Drops a token's cached identity (used at logout).
pub async fn forget_token(token: &str) {
    IDENTITY_CACHE.write().await.remove(token);
}

async fn token_from_parts(parts: &mut Parts, cookie_name: &str) -> Option<String> {
    if let Ok(TypedHeader(Authorization(bearer))) =
        parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        return Some(bearer.token().to_string());
    }
    let cookies = parts.headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name && !value.is_empty()).then(|| value.to_string())
    })
}

async fn resolve_user(app_state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    {
        let cache = IDENTITY_CACHE.read().await;
        if let Some(hit) = cache.get(token) {
            if hit.fetched.elapsed() < IDENTITY_TTL {
                return Ok(hit.user.clone());
            }
        }
    }

    match app_state.api.current_user(token).await {
        Ok(user) => {
            IDENTITY_CACHE.write().await.insert(
                token.to_string(),
                CachedIdentity {
                    user: user.clone(),
                    fetched: Instant::now(),
                },
            );
            Ok(user)
        }
        Err(e) => Err(AppError::from_api(e, &app_state.settings.login_endpoint)),
    }
}

/// Extracted by every signed-in handler.
#[derive(Clone)]
pub struct AuthenticatedUser {
    pub token: String,
    pub user: CurrentUser,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = token_from_parts(parts, "authToken")
            .await
            .ok_or_else(|| AppError::AuthRedirect(app_state.settings.login_endpoint.clone()))?;
        let user = resolve_user(&app_state, &token).await?;
        Ok(AuthenticatedUser { token, user })
    }
}

/// Extracted by every admin handler; carries the server-side aggregates the
/// probe returned so admin pages don't tally anything locally.
#[derive(Clone)]
pub struct AdminGate {
    pub token: String,
    pub stats: ReportStats,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminGate
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = match token_from_parts(parts, "adminAuthToken").await {
            Some(token) => token,
            None => token_from_parts(parts, "authToken").await.ok_or_else(|| {
                AppError::AuthRedirect(app_state.settings.admin_login_endpoint.clone())
            })?,
        };

        match app_state.api.admin_report_stats(&token).await {
            Ok(stats) => Ok(AdminGate { token, stats }),
            Err(ApiError::Unauthorized) => Err(AppError::AuthRedirect(
                app_state.settings.admin_login_endpoint.clone(),
            )),
            Err(ApiError::Forbidden) => Err(AppError::Forbidden(
                "Administrator access required.".to_string(),
            )),
            Err(e) => Err(AppError::from_api(
                e,
                &app_state.settings.admin_login_endpoint,
            )),
        }
    }
}
