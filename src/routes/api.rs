// JSON endpoints the dashboard page calls from the browser: saved searches,
// wishlist toggles, onboarding, location reports, notification plumbing.

use axum::{
    extract::{Json as JsonExtract, Path, State},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, auth_middleware::AuthenticatedUser, error::AppError, routes::session_for,
    wishlist::ToggleOutcome,
};

// --- Response wrappers ---

#[derive(Serialize)]
struct GenericResponse {
    success: bool,
    message: Option<String>,
    id: Option<i64>,
    error: Option<String>,
}

impl GenericResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            id: None,
            error: None,
        }
    }

    fn with_id(message: &str, id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::ok(message)
        }
    }
}

// --- Request structs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSearchRequest {
    name: String,
    #[serde(default)]
    notify_new_listings: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    notify_new_listings: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesRequest {
    category_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct PositionReport {
    lat: f64,
    lon: f64,
    accuracy: Option<f64>,
}

#[derive(Deserialize)]
pub struct NotificationSettings {
    enabled: bool,
}

// --- Saved searches ---

pub async fn save_search(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    JsonExtract(req): JsonExtract<SaveSearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: save_search for user {}", auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    let created = session
        .save_current_search(&req.name, req.notify_new_listings)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::with_id("Search saved.", created.id)))
}

pub async fn toggle_saved_alert(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonExtract(req): JsonExtract<AlertRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: toggle_saved_alert {} for user {}", id, auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    session.toggle_saved_alert(id, req.notify_new_listings).await;
    Ok(Json(GenericResponse::ok("Alert preference updated.")))
}

pub async fn apply_saved_search(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    tracing::info!("API call: apply_saved_search {} for user {}", id, auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    match session
        .apply_saved_search(id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?
    {
        Some(_) => Ok(Redirect::to("/dashboard").into_response()),
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_saved_search(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: delete_saved_search {} for user {}", id, auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    session
        .delete_saved_search(id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("Saved search deleted.")))
}

// --- Wishlist ---

#[derive(Serialize)]
struct WishlistToggleResponse {
    success: bool,
    state: &'static str,
}

pub async fn toggle_wishlist(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: toggle_wishlist {} for user {}", id, auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    let outcome = session
        .toggle_wishlist(id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    let state = match outcome {
        ToggleOutcome::Added => "added",
        ToggleOutcome::Removed => "removed",
        ToggleOutcome::InFlight => "pending",
    };
    Ok(Json(WishlistToggleResponse {
        success: true,
        state,
    }))
}

#[derive(Serialize)]
struct WishlistStateResponse {
    wishlisted: bool,
}

pub async fn wishlist_state(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = session_for(&app_state, &auth).await?;
    let wishlisted = session
        .wishlist
        .is_wishlisted(&*app_state.api, &auth.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(WishlistStateResponse { wishlisted }))
}

// --- Onboarding ---

pub async fn choose_categories(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    JsonExtract(req): JsonExtract<CategoriesRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: choose_categories for user {}", auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    session
        .choose_categories(&req.category_ids)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    // The personalized flag flipped server-side; refresh so the feed
    // reflects it on the next render.
    if let Err(e) = session.refresh_feed().await {
        tracing::warn!("Feed refresh after onboarding failed: {}", e);
    }
    Ok(Json(GenericResponse::ok("Preferences saved.")))
}

pub async fn skip_onboarding(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: skip_onboarding for user {}", auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    session
        .skip_onboarding()
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("Onboarding skipped.")))
}

// --- Location ---

pub async fn report_position(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    JsonExtract(report): JsonExtract<PositionReport>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: report_position for user {}", auth.user.id);
    let session = session_for(&app_state, &auth).await?;
    // Resolution is best-effort: failures are recorded on the session and
    // never fail this request.
    session
        .report_position(&app_state.geo, report.lat, report.lon, report.accuracy)
        .await;
    Ok(Json(GenericResponse::ok("Position received.")))
}

// --- Notifications ---

pub async fn configure_notifications(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    JsonExtract(settings): JsonExtract<NotificationSettings>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        "API call: configure_notifications({}) for user {}",
        settings.enabled,
        auth.user.id
    );
    let session = session_for(&app_state, &auth).await?;
    session.set_notifications_enabled(settings.enabled);
    Ok(Json(GenericResponse::ok("Notification settings applied.")))
}

pub async fn pending_notices(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let session = session_for(&app_state, &auth).await?;
    Ok(Json(session.notices.drain()))
}

pub async fn mark_notification_read(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .api
        .mark_notification_read(&auth.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("Notification marked as read.")))
}

pub async fn mark_all_notifications_read(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .api
        .mark_all_notifications_read(&auth.token, auth.user.id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("All notifications marked as read.")))
}

pub async fn delete_notification(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .api
        .delete_notification(&auth.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("Notification deleted.")))
}

pub async fn push_subscribe(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    JsonExtract(subscription): JsonExtract<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: push_subscribe for user {}", auth.user.id);
    app_state
        .api
        .push_subscribe(&auth.token, subscription)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Json(GenericResponse::ok("Subscribed to push notifications.")))
}
