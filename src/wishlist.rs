// The signed-in user's favourited listing ids, hydrated once per session.
// A per-listing in-flight flag swallows double clicks; the local set is only
// updated after the backend accepted the change (a 2xx is trusted without
// re-reading server state).

use std::collections::HashSet;
use std::sync::Mutex;

use crate::api_client::{ApiError, MarketApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// A toggle for this listing is already running; nothing was sent.
    InFlight,
}

pub struct Wishlist {
    ids: Mutex<HashSet<i64>>,
    in_flight: Mutex<HashSet<i64>>,
    hydrated: Mutex<bool>,
}

impl Default for Wishlist {
    fn default() -> Self {
        Self::new()
    }
}

impl Wishlist {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
            hydrated: Mutex::new(false),
        }
    }

    pub fn hydrate(&self, ids: Vec<i64>) {
        *self.ids.lock().unwrap() = ids.into_iter().collect();
        *self.hydrated.lock().unwrap() = true;
    }

    pub fn contains(&self, listing_id: i64) -> bool {
        self.ids.lock().unwrap().contains(&listing_id)
    }

    /// Membership check that falls back to the backend when the id set was
    /// never hydrated (e.g. the ids fetch failed at session start).
    pub async fn is_wishlisted<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        listing_id: i64,
    ) -> Result<bool, ApiError> {
        if *self.hydrated.lock().unwrap() {
            return Ok(self.contains(listing_id));
        }
        api.wishlist_check(token, listing_id).await
    }

    pub async fn toggle<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        listing_id: i64,
    ) -> Result<ToggleOutcome, ApiError> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(listing_id) {
                tracing::debug!("Wishlist toggle for {} already in flight", listing_id);
                return Ok(ToggleOutcome::InFlight);
            }
        }

        let present = self.contains(listing_id);
        let result = if present {
            api.wishlist_remove(token, listing_id).await
        } else {
            api.wishlist_add(token, listing_id).await
        };

        self.in_flight.lock().unwrap().remove(&listing_id);

        result?;
        let mut ids = self.ids.lock().unwrap();
        if present {
            ids.remove(&listing_id);
            Ok(ToggleOutcome::Removed)
        } else {
            ids.insert(listing_id);
            Ok(ToggleOutcome::Added)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockApi;

    #[tokio::test]
    async fn toggle_adds_then_removes() {
        let mock = MockApi::new();
        let wl = Wishlist::new();
        wl.hydrate(vec![]);
        assert_eq!(wl.toggle(&mock, "t", 5).await.unwrap(), ToggleOutcome::Added);
        assert!(wl.contains(5));
        assert_eq!(
            wl.toggle(&mock, "t", 5).await.unwrap(),
            ToggleOutcome::Removed
        );
        assert!(!wl.contains(5));
        assert_eq!(
            mock.calls(),
            vec!["POST /api/wishlist/5", "DELETE /api/wishlist/5"]
        );
    }

    #[tokio::test]
    async fn double_toggle_sends_a_single_request() {
        let mock = MockApi::new().with_wishlist_delay(50);
        let wl = Wishlist::new();
        wl.hydrate(vec![]);

        let first = wl.toggle(&mock, "t", 9);
        let second = async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            wl.toggle(&mock, "t", 9).await
        };
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), ToggleOutcome::Added);
        assert_eq!(b.unwrap(), ToggleOutcome::InFlight);
        assert_eq!(mock.calls(), vec!["POST /api/wishlist/9"]);
    }

    #[tokio::test]
    async fn failed_toggle_leaves_set_untouched_and_clears_guard() {
        let mock = MockApi::new().failing_wishlist();
        let wl = Wishlist::new();
        wl.hydrate(vec![]);
        assert!(wl.toggle(&mock, "t", 3).await.is_err());
        assert!(!wl.contains(3));
        // The guard must be released so the user can retry.
        let mock_ok = MockApi::new();
        assert_eq!(
            wl.toggle(&mock_ok, "t", 3).await.unwrap(),
            ToggleOutcome::Added
        );
    }

    #[tokio::test]
    async fn unhydrated_membership_asks_the_backend() {
        let mock = MockApi::new().with_wishlist_checked(true);
        let wl = Wishlist::new();
        assert!(wl.is_wishlisted(&mock, "t", 4).await.unwrap());
        assert_eq!(mock.calls(), vec!["GET /api/wishlist/4/check"]);

        wl.hydrate(vec![7]);
        let mock2 = MockApi::new();
        assert!(wl.is_wishlisted(&mock2, "t", 7).await.unwrap());
        assert!(mock2.calls().is_empty(), "hydrated set answers locally");
    }
}
