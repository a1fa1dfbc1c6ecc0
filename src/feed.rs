// Listing feed orchestration: the filter-driven fetch state machine.
//
// One request per refresh: the filtered listings endpoint when any filter
// field is set, otherwise the personalized endpoint. A 401 propagates (the
// route layer redirects); any other failure gets a single unfiltered retry
// before the feed settles into a degraded, empty Loaded state.
//
// Rapid consecutive refreshes race their responses; each refresh takes a
// sequence number and a response is only applied while its number is still
// current, so a stale reply can never overwrite a newer one.

use tokio::sync::Mutex;

use crate::api_client::{ApiError, MarketApi};
use crate::models::{Filter, Listing, UserLocation};
use crate::relevance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub phase: FeedPhase,
    pub listings: Vec<Listing>,
    pub personalized: bool,
    pub last_error: Option<String>,
}

struct Inner {
    phase: FeedPhase,
    listings: Vec<Listing>,
    personalized: bool,
    last_error: Option<String>,
    seq: u64,
}

pub struct FeedController {
    inner: Mutex<Inner>,
}

impl Default for FeedController {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedController {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: FeedPhase::Idle,
                listings: Vec::new(),
                personalized: false,
                last_error: None,
                seq: 0,
            }),
        }
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let g = self.inner.lock().await;
        snapshot_of(&g)
    }

    /// Re-orders the already-fetched feed in place once a location becomes
    /// known. No re-fetch.
    pub async fn resort(&self, location: &UserLocation) {
        let mut g = self.inner.lock().await;
        relevance::resort_in_place(&mut g.listings, Some(location));
    }

    pub async fn refresh<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        filter: &Filter,
        location: Option<&UserLocation>,
    ) -> Result<FeedSnapshot, ApiError> {
        let my_seq = {
            let mut g = self.inner.lock().await;
            g.seq += 1;
            g.phase = FeedPhase::Loading;
            g.seq
        };

        let primary = if filter.is_empty() {
            api.fetch_personalized(token)
                .await
                .map(|p| (p.listings, p.personalized))
        } else {
            api.fetch_listings(token, filter).await.map(|l| (l, false))
        };

        match primary {
            Ok((listings, personalized)) => {
                Ok(self
                    .apply(my_seq, listings, personalized, None, location)
                    .await)
            }
            Err(ApiError::Unauthorized) => {
                self.rewind(my_seq).await;
                Err(ApiError::Unauthorized)
            }
            Err(e) => {
                tracing::warn!("Listings fetch failed, retrying unfiltered: {}", e);
                {
                    let mut g = self.inner.lock().await;
                    if g.seq == my_seq {
                        g.phase = FeedPhase::Error;
                    }
                }
                match api.fetch_listings(token, &Filter::default()).await {
                    Ok(listings) => Ok(self.apply(my_seq, listings, false, None, location).await),
                    Err(ApiError::Unauthorized) => {
                        self.rewind(my_seq).await;
                        Err(ApiError::Unauthorized)
                    }
                    Err(e2) => {
                        tracing::error!("Unfiltered fallback failed as well: {}", e2);
                        let message = "Could not load listings. Please try again.".to_string();
                        Ok(self
                            .apply(my_seq, Vec::new(), false, Some(message), None)
                            .await)
                    }
                }
            }
        }
    }

    async fn apply(
        &self,
        my_seq: u64,
        mut listings: Vec<Listing>,
        personalized: bool,
        last_error: Option<String>,
        location: Option<&UserLocation>,
    ) -> FeedSnapshot {
        relevance::resort_in_place(&mut listings, location);
        let mut g = self.inner.lock().await;
        if g.seq != my_seq {
            tracing::debug!(
                "Discarding stale listings response (seq {}, current {})",
                my_seq,
                g.seq
            );
        } else {
            g.listings = listings;
            g.personalized = personalized;
            g.last_error = last_error;
            g.phase = FeedPhase::Loaded;
        }
        snapshot_of(&g)
    }

    async fn rewind(&self, my_seq: u64) {
        let mut g = self.inner.lock().await;
        if g.seq == my_seq {
            g.phase = FeedPhase::Idle;
        }
    }
}

fn snapshot_of(g: &Inner) -> FeedSnapshot {
    FeedSnapshot {
        phase: g.phase,
        listings: g.listings.clone(),
        personalized: g.personalized,
        last_error: g.last_error.clone(),
    }
}
