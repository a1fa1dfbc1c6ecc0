//! A recording mock of the backend API for orchestration tests. Every call
//! is logged as "METHOD /path[?query]" so tests can assert exactly what went
//! over the wire (and what never did).

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::api_client::{ApiError, MarketApi};
use crate::models::{
    Filter, Listing, ListingStatus, ModerationStatus, NewSavedSearch, Notification,
    PersonalizedListings, SavedSearch,
};

pub fn sample_listing(id: i64) -> Listing {
    Listing {
        id,
        title: format!("Listing {}", id),
        description: "A thing for sale".to_string(),
        price: 25.0,
        currency: "EUR".to_string(),
        category_id: Some(1),
        country: Some("DE".to_string()),
        city: None,
        location: None,
        condition: None,
        phone: None,
        status: ListingStatus::Available,
        moderation_status: ModerationStatus::Approved,
        user_id: 99,
        seller_name: None,
        seller_verified: false,
        created_at: Utc::now() - Duration::minutes(id),
        images: vec![],
    }
}

pub fn sample_notification(id: i64) -> Notification {
    Notification {
        id,
        user_id: 1,
        title: format!("Notification {}", id),
        message: "Something happened".to_string(),
        link: None,
        read: false,
        created_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<String>>,
    listings: Vec<Listing>,
    results_by_search: HashMap<String, Vec<Listing>>,
    delays_by_search: HashMap<String, u64>,
    personalized: Vec<Listing>,
    personalized_flag: bool,
    notifications: Vec<Notification>,
    wishlist_delay_ms: u64,
    wishlist_checked: bool,
    next_id: AtomicI64,
    fail_filtered: bool,
    fail_unfiltered: bool,
    fail_saved_update: bool,
    fail_saved_delete: bool,
    fail_wishlist: bool,
    fail_notifications: bool,
    unauthorized: bool,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub fn with_listings(mut self, listings: Vec<Listing>) -> Self {
        self.listings = listings;
        self
    }

    pub fn with_personalized(mut self, listings: Vec<Listing>, personalized: bool) -> Self {
        self.personalized = listings;
        self.personalized_flag = personalized;
        self
    }

    pub fn with_search_results(mut self, search: &str, listings: Vec<Listing>) -> Self {
        self.results_by_search.insert(search.to_string(), listings);
        self
    }

    pub fn with_search_delay(mut self, search: &str, millis: u64) -> Self {
        self.delays_by_search.insert(search.to_string(), millis);
        self
    }

    pub fn with_notifications(mut self, notifications: Vec<Notification>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_wishlist_delay(mut self, millis: u64) -> Self {
        self.wishlist_delay_ms = millis;
        self
    }

    pub fn with_wishlist_checked(mut self, checked: bool) -> Self {
        self.wishlist_checked = checked;
        self
    }

    pub fn failing_filtered(mut self) -> Self {
        self.fail_filtered = true;
        self
    }

    pub fn failing_unfiltered(mut self) -> Self {
        self.fail_unfiltered = true;
        self
    }

    pub fn failing_saved_search_update(mut self) -> Self {
        self.fail_saved_update = true;
        self
    }

    pub fn failing_saved_search_delete(mut self) -> Self {
        self.fail_saved_delete = true;
        self
    }

    pub fn failing_wishlist(mut self) -> Self {
        self.fail_wishlist = true;
        self
    }

    pub fn failing_notifications(mut self) -> Self {
        self.fail_notifications = true;
        self
    }

    pub fn always_unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "mock failure".to_string(),
        }
    }
}

impl MarketApi for MockApi {
    async fn fetch_listings(&self, _token: &str, filter: &Filter) -> Result<Vec<Listing>, ApiError> {
        let query = filter
            .query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            self.record("GET /api/listings".to_string());
        } else {
            self.record(format!("GET /api/listings?{}", query));
        }

        if self.unauthorized {
            return Err(ApiError::Unauthorized);
        }
        if let Some(millis) = self.delays_by_search.get(&filter.search) {
            tokio::time::sleep(std::time::Duration::from_millis(*millis)).await;
        }
        if filter.is_empty() {
            if self.fail_unfiltered {
                return Err(Self::server_error());
            }
            return Ok(self.listings.clone());
        }
        if self.fail_filtered {
            return Err(Self::server_error());
        }
        match self.results_by_search.get(&filter.search) {
            Some(results) => Ok(results.clone()),
            None => Ok(self.listings.clone()),
        }
    }

    async fn fetch_personalized(&self, _token: &str) -> Result<PersonalizedListings, ApiError> {
        self.record("GET /api/personalized-listings".to_string());
        if self.unauthorized {
            return Err(ApiError::Unauthorized);
        }
        Ok(PersonalizedListings {
            listings: self.personalized.clone(),
            personalized: self.personalized_flag,
        })
    }

    async fn create_saved_search(
        &self,
        _token: &str,
        req: &NewSavedSearch,
    ) -> Result<SavedSearch, ApiError> {
        self.record("POST /api/preferences/saved-searches".to_string());
        if self.unauthorized {
            return Err(ApiError::Unauthorized);
        }
        Ok(SavedSearch {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: req.name.clone(),
            filters: req.filters.clone(),
            notify_new_listings: req.notify_new_listings,
            created_at: Utc::now(),
        })
    }

    async fn update_saved_search_alert(
        &self,
        _token: &str,
        id: i64,
        _notify: bool,
    ) -> Result<(), ApiError> {
        self.record(format!("PUT /api/preferences/saved-searches/{}", id));
        if self.fail_saved_update {
            return Err(Self::server_error());
        }
        Ok(())
    }

    async fn delete_saved_search(&self, _token: &str, id: i64) -> Result<(), ApiError> {
        self.record(format!("DELETE /api/preferences/saved-searches/{}", id));
        if self.fail_saved_delete {
            return Err(Self::server_error());
        }
        Ok(())
    }

    async fn wishlist_add(&self, _token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.record(format!("POST /api/wishlist/{}", listing_id));
        if self.wishlist_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.wishlist_delay_ms)).await;
        }
        if self.fail_wishlist {
            return Err(Self::server_error());
        }
        Ok(())
    }

    async fn wishlist_remove(&self, _token: &str, listing_id: i64) -> Result<(), ApiError> {
        self.record(format!("DELETE /api/wishlist/{}", listing_id));
        if self.wishlist_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.wishlist_delay_ms)).await;
        }
        if self.fail_wishlist {
            return Err(Self::server_error());
        }
        Ok(())
    }

    async fn wishlist_check(&self, _token: &str, listing_id: i64) -> Result<bool, ApiError> {
        self.record(format!("GET /api/wishlist/{}/check", listing_id));
        Ok(self.wishlist_checked)
    }

    async fn save_category_preferences(
        &self,
        _token: &str,
        _category_ids: &[i64],
    ) -> Result<(), ApiError> {
        self.record("POST /api/preferences/categories".to_string());
        Ok(())
    }

    async fn skip_onboarding(&self, _token: &str) -> Result<(), ApiError> {
        self.record("POST /api/preferences/skip-onboarding".to_string());
        Ok(())
    }

    async fn notifications_since(
        &self,
        _token: &str,
        user_id: i64,
        _since: chrono::DateTime<Utc>,
    ) -> Result<Vec<Notification>, ApiError> {
        self.record(format!("GET /api/notifications/{}/new", user_id));
        if self.fail_notifications {
            return Err(Self::server_error());
        }
        Ok(self.notifications.clone())
    }

    async fn unread_notification_count(
        &self,
        _token: &str,
        user_id: i64,
    ) -> Result<i64, ApiError> {
        self.record(format!("GET /api/notifications/{}/unread-count", user_id));
        Ok(0)
    }

    async fn unread_message_count(&self, _token: &str) -> Result<i64, ApiError> {
        self.record("GET /api/messages/unread-count".to_string());
        Ok(0)
    }
}
