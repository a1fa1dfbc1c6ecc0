// Typed client for the external backend API. Every piece of business logic
// lives behind these endpoints; this process only forwards the caller's
// bearer token and mirrors the JSON back into view-models.
//
// One ApiClient wraps the single shared reqwest::Client built in main and is
// injected through AppState; nothing mutates process-global HTTP defaults.

use cached::{Cached, TimedCache};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{
    Appeal, Category, CurrentUser, Filter, KycSubmission, Listing, ModerationItem, NewSavedSearch,
    Notification, OnboardingStatus, PersonalizedListings, Report, ReportStats, SavedSearch,
};

/// Categories change rarely; cache them for five minutes.
const CATEGORY_CACHE_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    /// Local rejection; the request never left the process.
    #[error("{0}")]
    Validation(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The slice of the backend the dashboard components talk to. Split out as a
/// trait so orchestration tests can substitute a recording mock.
#[allow(async_fn_in_trait)]
pub trait MarketApi {
    async fn fetch_listings(&self, token: &str, filter: &Filter) -> Result<Vec<Listing>, ApiError>;
    async fn fetch_personalized(&self, token: &str) -> Result<PersonalizedListings, ApiError>;
    async fn create_saved_search(
        &self,
        token: &str,
        req: &NewSavedSearch,
    ) -> Result<SavedSearch, ApiError>;
    async fn update_saved_search_alert(
        &self,
        token: &str,
        id: i64,
        notify: bool,
    ) -> Result<(), ApiError>;
    async fn delete_saved_search(&self, token: &str, id: i64) -> Result<(), ApiError>;
    async fn wishlist_add(&self, token: &str, listing_id: i64) -> Result<(), ApiError>;
    async fn wishlist_remove(&self, token: &str, listing_id: i64) -> Result<(), ApiError>;
    async fn wishlist_check(&self, token: &str, listing_id: i64) -> Result<bool, ApiError>;
    async fn save_category_preferences(
        &self,
        token: &str,
        category_ids: &[i64],
    ) -> Result<(), ApiError>;
    async fn skip_onboarding(&self, token: &str) -> Result<(), ApiError>;
    async fn notifications_since(
        &self,
        token: &str,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Notification>, ApiError>;
    async fn unread_notification_count(&self, token: &str, user_id: i64) -> Result<i64, ApiError>;
    async fn unread_message_count(&self, token: &str) -> Result<i64, ApiError>;
}

pub struct ApiClient {
    http: Client,
    base: String,
    categories: Mutex<TimedCache<(), Vec<Category>>>,
}

impl ApiClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            categories: Mutex::new(TimedCache::with_lifespan(CATEGORY_CACHE_SECS)),
        }
    }

    /// The underlying shared HTTP client, for callers that talk to other
    /// services (e.g. the reverse geocoder).
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self
            .http
            .request(method, self.url(path))
            .bearer_auth(token)
            .header("Accept", "application/json");
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        check_status(response).await
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, ApiError> {
        let response = self.send(Method::GET, path, token, query, None).await?;
        Ok(response.json().await?)
    }

    /// Fire-and-check request with an optional JSON body; a 2xx status is
    /// trusted without reading the response body back.
    async fn send_checked(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), ApiError> {
        self.send(method, path, token, &[], body).await.map(|_| ())
    }

    // --- Identity ---

    pub async fn current_user(&self, token: &str) -> Result<CurrentUser, ApiError> {
        self.get_json(token, "/api/users/me", &[]).await
    }

    // --- Catalogue ---

    pub async fn categories(&self, token: &str) -> Result<Vec<Category>, ApiError> {
        if let Some(hit) = self.categories.lock().unwrap().cache_get(&()) {
            tracing::debug!("Serving categories from cache");
            return Ok(hit.clone());
        }
        let mut fetched: Vec<Category> = self.get_json(token, "/api/categories", &[]).await?;
        fetched.sort_by_key(|c| c.sort_order);
        self.categories.lock().unwrap().cache_set((), fetched.clone());
        Ok(fetched)
    }

    // --- Listings ---

    pub async fn listings(&self, token: &str, filter: &Filter) -> Result<Vec<Listing>, ApiError> {
        self.get_json(token, "/api/listings", &filter.query_pairs())
            .await
    }

    pub async fn personalized_listings(
        &self,
        token: &str,
    ) -> Result<PersonalizedListings, ApiError> {
        self.get_json(token, "/api/personalized-listings", &[]).await
    }

    pub async fn my_listings(&self, token: &str) -> Result<Vec<Listing>, ApiError> {
        self.get_json(token, "/api/my-listings", &[]).await
    }

    pub async fn create_listing(
        &self,
        token: &str,
        form: reqwest::multipart::Form,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/api/listings"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn mark_sold(&self, token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/listings/{}/mark-sold", listing_id),
            token,
            None,
        )
        .await
    }

    pub async fn mark_available(&self, token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/listings/{}/mark-available", listing_id),
            token,
            None,
        )
        .await
    }

    // --- Saved searches ---

    pub async fn saved_searches(&self, token: &str) -> Result<Vec<SavedSearch>, ApiError> {
        self.get_json(token, "/api/preferences/saved-searches", &[])
            .await
    }

    // --- Wishlist ---

    pub async fn wishlist_ids(&self, token: &str) -> Result<Vec<i64>, ApiError> {
        #[derive(serde::Deserialize)]
        struct Ids {
            ids: Vec<i64>,
        }
        let ids: Ids = self.get_json(token, "/api/wishlist/ids", &[]).await?;
        Ok(ids.ids)
    }

    // --- Onboarding ---

    pub async fn onboarding_status(&self, token: &str) -> Result<OnboardingStatus, ApiError> {
        self.get_json(token, "/api/preferences/onboarding-status", &[])
            .await
    }

    // --- KYC ---

    pub async fn kyc_submissions(&self, token: &str) -> Result<Vec<KycSubmission>, ApiError> {
        self.get_json(token, "/api/kyc/status", &[]).await
    }

    pub async fn kyc_submit(
        &self,
        token: &str,
        form: reqwest::multipart::Form,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/api/kyc/submit"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn kyc_pending(&self, token: &str) -> Result<Vec<KycSubmission>, ApiError> {
        self.get_json(token, "/api/kyc/pending", &[]).await
    }

    pub async fn kyc_review(
        &self,
        token: &str,
        id: i64,
        approve: bool,
        notes: Option<&str>,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/kyc/{}/review", id),
            token,
            Some(json!({ "approve": approve, "notes": notes })),
        )
        .await
    }

    // --- Moderation / admin ---

    pub async fn admin_report_stats(&self, token: &str) -> Result<ReportStats, ApiError> {
        self.get_json(token, "/api/admin/reports/stats", &[]).await
    }

    pub async fn admin_reports(&self, token: &str) -> Result<Vec<Report>, ApiError> {
        self.get_json(token, "/api/admin/reports", &[]).await
    }

    pub async fn admin_update_report(
        &self,
        token: &str,
        id: i64,
        action: &str,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/admin/reports/{}", id),
            token,
            Some(json!({ "action": action })),
        )
        .await
    }

    pub async fn admin_appeals(&self, token: &str) -> Result<Vec<Appeal>, ApiError> {
        self.get_json(token, "/api/admin/appeals", &[]).await
    }

    pub async fn admin_update_appeal(
        &self,
        token: &str,
        id: i64,
        action: &str,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/admin/appeals/{}", id),
            token,
            Some(json!({ "action": action })),
        )
        .await
    }

    pub async fn admin_suspend_user(
        &self,
        token: &str,
        user_id: i64,
        reason: &str,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/admin/users/{}/suspend", user_id),
            token,
            Some(json!({ "reason": reason })),
        )
        .await
    }

    pub async fn admin_lift_suspension(&self, token: &str, id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/admin/suspensions/{}/lift", id),
            token,
            None,
        )
        .await
    }

    pub async fn admin_user_history(
        &self,
        token: &str,
        user_id: i64,
    ) -> Result<Vec<ModerationItem>, ApiError> {
        self.get_json(token, &format!("/api/admin/users/{}/history", user_id), &[])
            .await
    }

    // --- Notifications ---

    pub async fn notifications(
        &self,
        token: &str,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<Notification>, ApiError> {
        self.get_json(
            token,
            &format!("/api/notifications/{}", user_id),
            &[("limit", limit.to_string())],
        )
        .await
    }

    pub async fn mark_notification_read(&self, token: &str, id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/notifications/{}/read", id),
            token,
            None,
        )
        .await
    }

    pub async fn mark_all_notifications_read(
        &self,
        token: &str,
        user_id: i64,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/notifications/user/{}/read-all", user_id),
            token,
            None,
        )
        .await
    }

    pub async fn delete_notification(&self, token: &str, id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::DELETE,
            &format!("/api/notifications/{}", id),
            token,
            None,
        )
        .await
    }

    pub async fn push_subscribe(
        &self,
        token: &str,
        subscription: serde_json::Value,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::POST,
            "/api/notifications/subscribe",
            token,
            Some(subscription),
        )
        .await
    }
}

impl MarketApi for ApiClient {
    async fn fetch_listings(&self, token: &str, filter: &Filter) -> Result<Vec<Listing>, ApiError> {
        self.listings(token, filter).await
    }

    async fn fetch_personalized(&self, token: &str) -> Result<PersonalizedListings, ApiError> {
        self.personalized_listings(token).await
    }

    async fn create_saved_search(
        &self,
        token: &str,
        req: &NewSavedSearch,
    ) -> Result<SavedSearch, ApiError> {
        let response = self
            .send(
                Method::POST,
                "/api/preferences/saved-searches",
                token,
                &[],
                Some(serde_json::to_value(req).expect("saved search serializes")),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn update_saved_search_alert(
        &self,
        token: &str,
        id: i64,
        notify: bool,
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::PUT,
            &format!("/api/preferences/saved-searches/{}", id),
            token,
            Some(json!({ "notifyNewListings": notify })),
        )
        .await
    }

    async fn delete_saved_search(&self, token: &str, id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::DELETE,
            &format!("/api/preferences/saved-searches/{}", id),
            token,
            None,
        )
        .await
    }

    async fn wishlist_add(&self, token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::POST,
            &format!("/api/wishlist/{}", listing_id),
            token,
            None,
        )
        .await
    }

    async fn wishlist_remove(&self, token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.send_checked(
            Method::DELETE,
            &format!("/api/wishlist/{}", listing_id),
            token,
            None,
        )
        .await
    }

    async fn wishlist_check(&self, token: &str, listing_id: i64) -> Result<bool, ApiError> {
        #[derive(serde::Deserialize)]
        struct Check {
            wishlisted: bool,
        }
        let check: Check = self
            .get_json(token, &format!("/api/wishlist/{}/check", listing_id), &[])
            .await?;
        Ok(check.wishlisted)
    }

    async fn save_category_preferences(
        &self,
        token: &str,
        category_ids: &[i64],
    ) -> Result<(), ApiError> {
        self.send_checked(
            Method::POST,
            "/api/preferences/categories",
            token,
            Some(json!({ "categoryIds": category_ids })),
        )
        .await
    }

    async fn skip_onboarding(&self, token: &str) -> Result<(), ApiError> {
        self.send_checked(Method::POST, "/api/preferences/skip-onboarding", token, None)
            .await
    }

    async fn notifications_since(
        &self,
        token: &str,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Notification>, ApiError> {
        self.get_json(
            token,
            &format!("/api/notifications/{}/new", user_id),
            &[("since", since.to_rfc3339())],
        )
        .await
    }

    async fn unread_notification_count(&self, token: &str, user_id: i64) -> Result<i64, ApiError> {
        #[derive(serde::Deserialize)]
        struct Count {
            count: i64,
        }
        let count: Count = self
            .get_json(
                token,
                &format!("/api/notifications/{}/unread-count", user_id),
                &[],
            )
            .await?;
        Ok(count.count)
    }

    async fn unread_message_count(&self, token: &str) -> Result<i64, ApiError> {
        #[derive(serde::Deserialize)]
        struct Count {
            count: i64,
        }
        let count: Count = self
            .get_json(token, "/api/messages/unread-count", &[])
            .await?;
        Ok(count.count)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}
