// Login and logout. The backend issues the token; this handler only checks
// it against the identity endpoint, sets the session cookie and redirects.

use axum::{
    extract::{Form, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    api_client::ApiError,
    auth_middleware::{self, AuthenticatedUser},
    error::AppError,
    models::LoginForm,
};

pub async fn handle_login(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let token = form.auth_token.trim().to_string();
    if token.is_empty() {
        return Ok(Redirect::to("/login?error=true").into_response());
    }
    tracing::info!(
        "Received login token (first few chars): {}",
        &token[..std::cmp::min(token.len(), 10)]
    );

    match app_state.api.current_user(&token).await {
        Ok(user) => {
            tracing::info!("Token accepted for user {}", user.id);
            let cookie = format!("authToken={}; Path=/; HttpOnly; SameSite=Lax", token);
            Ok((
                AppendHeaders([(SET_COOKIE, cookie)]),
                Redirect::to("/dashboard"),
            )
                .into_response())
        }
        Err(ApiError::Unauthorized) => {
            tracing::warn!("Login token rejected by the backend");
            Ok(Redirect::to("/login?error=true").into_response())
        }
        Err(e) => Err(AppError::from_api(e, &app_state.settings.login_endpoint)),
    }
}

pub async fn handle_logout(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Response, AppError> {
    tracing::info!("Logout for user {}", auth.user.id);
    auth_middleware::forget_token(&auth.token).await;
    app_state.sessions.remove(&auth.token).await;
    let expired = "authToken=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
    Ok((
        AppendHeaders([(SET_COOKIE, expired.to_string())]),
        Redirect::to("/"),
    )
        .into_response())
}
