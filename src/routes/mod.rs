// Route definitions

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use crate::{
    AppState, auth_middleware::AuthenticatedUser, error::AppError, session::DashboardSession,
};

mod admin;
mod api;
mod auth;
mod pages;

/// Fetch-or-build the caller's dashboard session. Shared by the page and
/// JSON handlers.
pub(crate) async fn session_for(
    app_state: &AppState,
    auth: &AuthenticatedUser,
) -> Result<Arc<DashboardSession>, AppError> {
    app_state
        .sessions
        .get_or_create(
            app_state.api.clone(),
            &app_state.geo,
            &auth.token,
            auth.user.clone(),
        )
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))
}

pub fn create_router(app_state: AppState) -> Router {
    // JSON endpoints the dashboard page calls from the browser.
    let api_router = Router::new()
        .route("/saved-searches", post(api::save_search))
        .route("/saved-searches/:id/alert", put(api::toggle_saved_alert))
        .route("/saved-searches/:id/apply", post(api::apply_saved_search))
        .route("/saved-searches/:id", delete(api::delete_saved_search))
        .route("/wishlist/:id/toggle", post(api::toggle_wishlist))
        .route("/wishlist/:id/state", get(api::wishlist_state))
        .route("/onboarding/categories", post(api::choose_categories))
        .route("/onboarding/skip", post(api::skip_onboarding))
        .route("/session/location", post(api::report_position))
        .route("/session/notifications", post(api::configure_notifications))
        .route("/notices", get(api::pending_notices))
        .route("/notifications/:id/read", post(api::mark_notification_read))
        .route("/notifications/read-all", post(api::mark_all_notifications_read))
        .route("/notifications/:id", delete(api::delete_notification))
        .route("/push/subscribe", post(api::push_subscribe))
        .with_state(app_state.clone());

    // Moderation surfaces, all behind the single AdminGate probe.
    let admin_router = Router::new()
        .route("/", get(admin::dashboard))
        .route("/reports/export.csv", get(admin::export_reports_csv))
        .route("/reports/:id", post(admin::act_on_report))
        .route("/appeals/:id", post(admin::act_on_appeal))
        .route("/suspensions/:id/lift", post(admin::lift_suspension))
        .route("/users/:id", get(admin::user_history))
        .route("/users/:id/suspend", post(admin::suspend_user))
        .route("/kyc", get(admin::kyc_queue))
        .route("/kyc/:id/review", post(admin::review_kyc))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::landing_page))
        .route("/login", get(pages::login_page))
        .route("/login", post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/dashboard", get(pages::dashboard_page))
        .route("/search", post(pages::run_search))
        .route("/search/reset", post(pages::reset_search))
        .route("/listings/new", get(pages::new_listing_page))
        .route("/listings", post(pages::create_listing))
        .route("/listings/:id/mark-sold", post(pages::mark_sold))
        .route("/listings/:id/mark-available", post(pages::mark_available))
        .route("/kyc", get(pages::kyc_page))
        .route("/kyc", post(pages::submit_kyc))
        .route("/notifications", get(pages::notifications_page))
        .nest("/api", api_router)
        .nest("/admin", admin_router)
        .with_state(app_state)
}
