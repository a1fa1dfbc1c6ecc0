// Page handlers. Each one assembles plain display structs and hands them to
// an askama template; anything the page mutates goes through the session.

use askama::Template;
use axum::{
    extract::{Form, Multipart, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use anyhow::Context;

use crate::{
    AppState,
    auth_middleware::AuthenticatedUser,
    error::AppError,
    models::{Category, Filter, KycSubmission, Listing, Notification, SavedSearch},
    routes::session_for,
    timefmt,
    wishlist::Wishlist,
};

const MAX_LISTING_IMAGES: usize = 10;

// --- Display structs ---

pub struct ListingView {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub location: String,
    pub posted: String,
    pub is_new: bool,
    pub wishlisted: bool,
    pub sold: bool,
    pub image: String,
}

impl ListingView {
    fn build(listing: &Listing, wishlist: &Wishlist) -> Self {
        let rel = timefmt::format_relative_time(listing.created_at);
        let location = listing
            .location
            .clone()
            .or_else(|| match (&listing.city, &listing.country) {
                (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
                (Some(city), None) => Some(city.clone()),
                (None, Some(country)) => Some(country.clone()),
                (None, None) => None,
            })
            .unwrap_or_default();
        Self {
            id: listing.id,
            title: listing.title.clone(),
            price: format!("{:.2} {}", listing.price, listing.currency),
            location,
            posted: rel.text,
            is_new: rel.is_new,
            wishlisted: wishlist.contains(listing.id),
            sold: listing.status == crate::models::ListingStatus::Sold,
            image: listing.main_image().unwrap_or_default().to_string(),
        }
    }
}

pub struct CategoryView {
    pub id: i64,
    pub name: String,
}

pub struct SavedSearchView {
    pub id: i64,
    pub name: String,
    pub notify: bool,
}

pub struct NotificationView {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub time: String,
    pub read: bool,
}

pub struct KycRowView {
    pub document_type: String,
    pub status: String,
    pub submitted: String,
    pub notes: String,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    username: String,
    personalized: bool,
    feed_error: String,
    listings: Vec<ListingView>,
    my_listings: Vec<ListingView>,
    categories: Vec<CategoryView>,
    saved_searches: Vec<SavedSearchView>,
    filter: Filter,
    location_label: String,
    location_error: String,
    unread_notifications: i64,
    unread_messages: i64,
    needs_onboarding: bool,
    vapid_public_key: String,
}

#[derive(Template)]
#[template(path = "listing_new.html")]
struct NewListingTemplate {
    categories: Vec<CategoryView>,
    error: String,
}

#[derive(Template)]
#[template(path = "kyc.html")]
struct KycTemplate {
    submissions: Vec<KycRowView>,
    error: String,
}

#[derive(Template)]
#[template(path = "notifications.html")]
struct NotificationsTemplate {
    notifications: Vec<NotificationView>,
}

fn render<T: Template>(template: T) -> Result<Html<String>, AppError> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render template: {}", e);
            Err(AppError::Internal(anyhow::Error::new(e)))
        }
    }
}

fn category_views(categories: &[Category]) -> Vec<CategoryView> {
    categories
        .iter()
        .map(|c| CategoryView {
            id: c.id,
            name: c.name.clone(),
        })
        .collect()
}

fn saved_views(items: &[SavedSearch]) -> Vec<SavedSearchView> {
    items
        .iter()
        .map(|s| SavedSearchView {
            id: s.id,
            name: s.name.clone(),
            notify: s.notify_new_listings,
        })
        .collect()
}

fn kyc_views(items: &[KycSubmission]) -> Vec<KycRowView> {
    items
        .iter()
        .map(|k| KycRowView {
            document_type: k.document_type.clone(),
            status: match k.status {
                crate::models::KycStatus::Pending => "Pending review".to_string(),
                crate::models::KycStatus::Approved => "Approved".to_string(),
                crate::models::KycStatus::Rejected => "Rejected".to_string(),
            },
            submitted: timefmt::format_relative_time(k.submitted_at).text,
            notes: k.notes.clone().unwrap_or_default(),
        })
        .collect()
}

fn notification_views(items: &[Notification]) -> Vec<NotificationView> {
    items
        .iter()
        .map(|n| NotificationView {
            id: n.id,
            title: n.title.clone(),
            message: n.message.clone(),
            time: timefmt::format_relative_time(n.created_at).text,
            read: n.read,
        })
        .collect()
}

// --- Handlers ---

pub async fn landing_page() -> Result<impl IntoResponse, AppError> {
    render(LandingTemplate)
}

#[derive(serde::Deserialize, Default)]
pub struct LoginQuery {
    #[serde(default)]
    error: bool,
}

pub async fn login_page(
    axum::extract::Query(query): axum::extract::Query<LoginQuery>,
) -> Result<impl IntoResponse, AppError> {
    let error = if query.error {
        "Sign-in failed. Check your token and try again.".to_string()
    } else {
        String::new()
    };
    render(LoginTemplate { error })
}

pub async fn dashboard_page(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Page: /dashboard for user {}", auth.user.id);
    let session = session_for(&app_state, &auth).await?;

    let snapshot = session.feed.snapshot().await;
    let categories = match app_state.api.categories(&auth.token).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Categories unavailable: {}", e);
            Vec::new()
        }
    };
    let saved = session.saved.list().await;
    let mine = session.my_listings.lock().await.clone();
    let filter = session.filter.lock().await.clone();

    let template = DashboardTemplate {
        username: auth.user.username.clone(),
        personalized: snapshot.personalized,
        feed_error: snapshot.last_error.unwrap_or_default(),
        listings: snapshot
            .listings
            .iter()
            .map(|l| ListingView::build(l, &session.wishlist))
            .collect(),
        my_listings: mine
            .iter()
            .map(|l| ListingView::build(l, &session.wishlist))
            .collect(),
        categories: category_views(&categories),
        saved_searches: saved_views(&saved),
        filter,
        location_label: session.location().map(|l| l.label()).unwrap_or_default(),
        location_error: session.location_error().unwrap_or_default(),
        unread_notifications: session.counts.notifications(),
        unread_messages: session.counts.messages(),
        needs_onboarding: session.onboarding.needs_onboarding(),
        vapid_public_key: app_state
            .settings
            .vapid_public_key
            .clone()
            .unwrap_or_default(),
    };
    render(template)
}

pub async fn run_search(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Form(filter): Form<Filter>,
) -> Result<Response, AppError> {
    tracing::info!("Search for user {}: {:?}", auth.user.id, filter.query_pairs());
    let session = session_for(&app_state, &auth).await?;
    session
        .search(filter)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn reset_search(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Response, AppError> {
    let session = session_for(&app_state, &auth).await?;
    session
        .reset_filters()
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn new_listing_page(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let categories = app_state
        .api
        .categories(&auth.token)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    render(NewListingTemplate {
        categories: category_views(&categories),
        error: String::new(),
    })
}

/// Multipart listing creation: text fields plus up to ten images, forwarded
/// to the backend as-is. Validation failures re-render the form and never
/// reach the network.
pub async fn create_listing(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    tracing::info!("API call: create_listing for user {}", auth.user.id);

    let mut texts: Vec<(String, String)> = Vec::new();
    let mut images: Vec<(String, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .context("failed to read multipart field")?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.context("failed to read image upload")?;
            if !data.is_empty() {
                images.push((file_name, content_type, data.to_vec()));
            }
        } else {
            let value = field.text().await.context("failed to read form field")?;
            texts.push((name, value));
        }
    }

    let missing = |key: &str| {
        !texts
            .iter()
            .any(|(k, v)| k == key && !v.trim().is_empty())
    };
    let validation_error = if auth.user.suspended {
        Some("Your account is suspended; you cannot create listings.".to_string())
    } else if missing("title") || missing("price") || missing("currency") || missing("category") {
        Some("Title, price, currency and category are required.".to_string())
    } else if images.len() > MAX_LISTING_IMAGES {
        Some(format!("At most {} images are allowed.", MAX_LISTING_IMAGES))
    } else {
        None
    };

    if let Some(error) = validation_error {
        let categories = app_state
            .api
            .categories(&auth.token)
            .await
            .unwrap_or_default();
        return Ok(render(NewListingTemplate {
            categories: category_views(&categories),
            error,
        })?
        .into_response());
    }

    let mut form = reqwest::multipart::Form::new();
    for (name, value) in texts {
        form = form.text(name, value);
    }
    for (file_name, content_type, data) in images {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(&content_type)
            .context("invalid image content type")?;
        form = form.part("images", part);
    }

    app_state
        .api
        .create_listing(&auth.token, form)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;

    if let Some(session) = app_state.sessions.get(&auth.token).await {
        if let Err(e) = session.reload_my_listings().await {
            tracing::warn!("Own listings refresh failed after create: {}", e);
        }
    }
    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn mark_sold(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    tracing::info!("API call: mark_sold {} for user {}", id, auth.user.id);
    app_state
        .api
        .mark_sold(&auth.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    refresh_my_listings(&app_state, &auth).await;
    Ok(Redirect::to("/dashboard").into_response())
}

pub async fn mark_available(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    tracing::info!("API call: mark_available {} for user {}", id, auth.user.id);
    app_state
        .api
        .mark_available(&auth.token, id)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    refresh_my_listings(&app_state, &auth).await;
    Ok(Redirect::to("/dashboard").into_response())
}

async fn refresh_my_listings(app_state: &AppState, auth: &AuthenticatedUser) {
    if let Some(session) = app_state.sessions.get(&auth.token).await {
        if let Err(e) = session.reload_my_listings().await {
            tracing::warn!("Own listings refresh failed: {}", e);
        }
    }
}

pub async fn kyc_page(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let submissions = app_state
        .api
        .kyc_submissions(&auth.token)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    render(KycTemplate {
        submissions: kyc_views(&submissions),
        error: String::new(),
    })
}

pub async fn submit_kyc(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    tracing::info!("API call: submit_kyc for user {}", auth.user.id);

    let mut document_type = String::new();
    let mut document: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .context("failed to read multipart field")?
    {
        match field.name().unwrap_or_default() {
            "documentType" => {
                document_type = field.text().await.context("failed to read document type")?
            }
            "document" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.context("failed to read document upload")?;
                if !data.is_empty() {
                    document = Some((file_name, content_type, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    let validation_error = if document_type.trim().is_empty() {
        Some("Select a document type before submitting.".to_string())
    } else if document.is_none() {
        Some("Attach the document file.".to_string())
    } else {
        None
    };

    if let Some(error) = validation_error {
        let submissions = app_state
            .api
            .kyc_submissions(&auth.token)
            .await
            .unwrap_or_default();
        return Ok(render(KycTemplate {
            submissions: kyc_views(&submissions),
            error,
        })?
        .into_response());
    }

    let (file_name, content_type, data) = document.expect("validated above");
    let part = reqwest::multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str(&content_type)
        .context("invalid document content type")?;
    let form = reqwest::multipart::Form::new()
        .text("documentType", document_type)
        .part("document", part);

    app_state
        .api
        .kyc_submit(&auth.token, form)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    Ok(Redirect::to("/kyc").into_response())
}

pub async fn notifications_page(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let notifications = app_state
        .api
        .notifications(&auth.token, auth.user.id, 50)
        .await
        .map_err(|e| AppError::from_api(e, &app_state.settings.login_endpoint))?;
    render(NotificationsTemplate {
        notifications: notification_views(&notifications),
    })
}
