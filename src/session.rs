// Per-user dashboard state. Everything the page mutates between requests
// lives here: the active filter, the fetched feed, saved searches, the
// wishlist set, the location fix and the background pollers. Sessions are
// keyed by bearer token and pruned after an hour of inactivity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::api_client::{ApiClient, ApiError};
use crate::feed::{FeedController, FeedSnapshot};
use crate::geo::GeoResolver;
use crate::models::{CurrentUser, Filter, Listing, UserLocation};
use crate::notify::{NoticeBoard, Pollers, UnreadCounts};
use crate::onboarding::OnboardingGate;
use crate::saved_searches::SavedSearchManager;
use crate::wishlist::{ToggleOutcome, Wishlist};

const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(3600);

pub struct DashboardSession {
    pub user: CurrentUser,
    token: String,
    api: Arc<ApiClient>,
    pub filter: tokio::sync::Mutex<Filter>,
    pub feed: FeedController,
    pub saved: SavedSearchManager,
    pub wishlist: Wishlist,
    pub onboarding: OnboardingGate,
    pub my_listings: tokio::sync::Mutex<Vec<Listing>>,
    location: StdMutex<Option<UserLocation>>,
    location_error: StdMutex<Option<String>>,
    pub notices: Arc<NoticeBoard>,
    pub counts: Arc<UnreadCounts>,
    pollers: StdMutex<Pollers>,
    last_seen: StdMutex<Instant>,
}

impl DashboardSession {
    fn new(api: Arc<ApiClient>, token: String, user: CurrentUser) -> Self {
        let counts = Arc::new(UnreadCounts::new());
        let pollers = Pollers::start(api.clone(), token.clone(), user.id, counts.clone());
        Self {
            user,
            token,
            api,
            filter: tokio::sync::Mutex::new(Filter::default()),
            feed: FeedController::new(),
            saved: SavedSearchManager::new(),
            wishlist: Wishlist::new(),
            onboarding: OnboardingGate::new(),
            my_listings: tokio::sync::Mutex::new(Vec::new()),
            location: StdMutex::new(None),
            location_error: StdMutex::new(None),
            notices: Arc::new(NoticeBoard::new()),
            counts,
            pollers: StdMutex::new(pollers),
            last_seen: StdMutex::new(Instant::now()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn location(&self) -> Option<UserLocation> {
        self.location.lock().unwrap().clone()
    }

    pub fn location_error(&self) -> Option<String> {
        self.location_error.lock().unwrap().clone()
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen.lock().unwrap().elapsed()
    }

    /// First load: apply the cached location, then fetch everything the
    /// dashboard needs in parallel. Only an auth failure aborts; every other
    /// section degrades on its own.
    async fn hydrate(&self, geo: &GeoResolver) -> Result<(), ApiError> {
        let cached = geo.load_cached(self.user.id);
        if let Some(loc) = &cached {
            tracing::debug!("Applying cached location for user {}", self.user.id);
            *self.location.lock().unwrap() = Some(loc.clone());
        }

        let default_filter = Filter::default();
        let (feed_res, saved_res, wishlist_res, onboarding_res, mine_res) = tokio::join!(
            self.feed
                .refresh(&*self.api, &self.token, &default_filter, cached.as_ref()),
            self.api.saved_searches(&self.token),
            self.api.wishlist_ids(&self.token),
            self.api.onboarding_status(&self.token),
            self.api.my_listings(&self.token),
        );

        feed_res?;
        match saved_res {
            Ok(items) => self.saved.hydrate(items).await,
            Err(e) => tracing::warn!("Saved searches unavailable: {}", e),
        }
        match wishlist_res {
            Ok(ids) => self.wishlist.hydrate(ids),
            Err(e) => tracing::warn!("Wishlist ids unavailable: {}", e),
        }
        match onboarding_res {
            Ok(status) => self.onboarding.hydrate(status),
            Err(e) => tracing::warn!("Onboarding status unavailable: {}", e),
        }
        match mine_res {
            Ok(mine) => *self.my_listings.lock().await = mine,
            Err(e) => tracing::warn!("Own listings unavailable: {}", e),
        }
        Ok(())
    }

    /// Replaces the active filter and re-runs the fetch orchestration.
    pub async fn search(&self, filter: Filter) -> Result<FeedSnapshot, ApiError> {
        self.touch();
        *self.filter.lock().await = filter.clone();
        self.feed
            .refresh(&*self.api, &self.token, &filter, self.location().as_ref())
            .await
    }

    /// Clears every filter field and re-fetches (which routes to the
    /// personalized endpoint).
    pub async fn reset_filters(&self) -> Result<FeedSnapshot, ApiError> {
        self.search(Filter::default()).await
    }

    pub async fn refresh_feed(&self) -> Result<FeedSnapshot, ApiError> {
        let filter = self.filter.lock().await.clone();
        self.feed
            .refresh(&*self.api, &self.token, &filter, self.location().as_ref())
            .await
    }

    pub async fn apply_saved_search(&self, id: i64) -> Result<Option<FeedSnapshot>, ApiError> {
        match self.saved.apply(id).await {
            Some(filter) => self.search(filter).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn save_current_search(
        &self,
        name: &str,
        notify: bool,
    ) -> Result<crate::models::SavedSearch, ApiError> {
        let filter = self.filter.lock().await.clone();
        self.saved
            .save(&*self.api, &self.token, name, &filter, notify)
            .await
    }

    pub async fn toggle_saved_alert(&self, id: i64, notify: bool) {
        self.saved
            .toggle_alert(&*self.api, &self.token, id, notify)
            .await;
    }

    pub async fn delete_saved_search(&self, id: i64) -> Result<(), ApiError> {
        self.saved.delete(&*self.api, &self.token, id).await
    }

    pub async fn toggle_wishlist(&self, listing_id: i64) -> Result<ToggleOutcome, ApiError> {
        self.wishlist
            .toggle(&*self.api, &self.token, listing_id)
            .await
    }

    pub async fn choose_categories(&self, ids: &[i64]) -> Result<(), ApiError> {
        self.onboarding
            .choose_categories(&*self.api, &self.token, ids)
            .await
    }

    pub async fn skip_onboarding(&self) -> Result<(), ApiError> {
        self.onboarding.skip(&*self.api, &self.token).await
    }

    pub async fn reload_my_listings(&self) -> Result<(), ApiError> {
        let mine = self.api.my_listings(&self.token).await?;
        *self.my_listings.lock().await = mine;
        Ok(())
    }

    /// Stores a fresh reverse-geocoded fix and re-sorts the feed in place.
    /// Failures are recorded on the session; any cached location stays.
    pub async fn report_position(&self, geo: &GeoResolver, lat: f64, lon: f64, accuracy: Option<f64>) {
        match geo
            .resolve(self.api.http(), self.user.id, lat, lon, accuracy)
            .await
        {
            Ok(loc) => {
                *self.location.lock().unwrap() = Some(loc.clone());
                *self.location_error.lock().unwrap() = None;
                self.feed.resort(&loc).await;
            }
            Err(e) => {
                tracing::warn!("Location resolution failed for user {}: {:#}", self.user.id, e);
                *self.location_error.lock().unwrap() =
                    Some("Could not determine your location.".to_string());
            }
        }
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.pollers.lock().unwrap().set_notifications_enabled(
            enabled,
            self.api.clone(),
            self.token.clone(),
            self.user.id,
            self.notices.clone(),
        );
    }

}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, Arc<DashboardSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, token: &str) -> Option<Arc<DashboardSession>> {
        let sessions = self.inner.read().await;
        sessions.get(token).inspect(|s| s.touch()).cloned()
    }

    /// Fetch-or-build for the dashboard page. A newly built session is
    /// hydrated before it becomes visible to other requests.
    pub async fn get_or_create(
        &self,
        api: Arc<ApiClient>,
        geo: &GeoResolver,
        token: &str,
        user: CurrentUser,
    ) -> Result<Arc<DashboardSession>, ApiError> {
        if let Some(existing) = self.get(token).await {
            if existing.user.id == user.id {
                return Ok(existing);
            }
            // Token now resolves to someone else; rebuild below.
            self.remove(token).await;
        }

        let session = Arc::new(DashboardSession::new(api, token.to_string(), user));
        session.hydrate(geo).await?;

        let mut sessions = self.inner.write().await;
        sessions.retain(|_, s| s.idle_for() < SESSION_IDLE_LIMIT);
        let entry = sessions
            .entry(token.to_string())
            .or_insert_with(|| session.clone());
        Ok(entry.clone())
    }

    pub async fn remove(&self, token: &str) {
        if self.inner.write().await.remove(token).is_some() {
            tracing::info!("Session removed");
        }
    }
}
