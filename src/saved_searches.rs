// Named filter snapshots with an alert toggle, mirrored from the backend.
// Saving validates locally first; the alert toggle is optimistic and
// best-effort; deletion only drops the local copy after the backend agreed.

use tokio::sync::Mutex;

use crate::api_client::{ApiError, MarketApi};
use crate::models::{Filter, NewSavedSearch, SavedSearch};

pub struct SavedSearchManager {
    items: Mutex<Vec<SavedSearch>>,
}

impl Default for SavedSearchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SavedSearchManager {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub async fn hydrate(&self, items: Vec<SavedSearch>) {
        *self.items.lock().await = items;
    }

    pub async fn list(&self) -> Vec<SavedSearch> {
        self.items.lock().await.clone()
    }

    /// Saves the current filter set under a name. Rejected locally, with no
    /// request sent, when the filter is empty or the name is blank.
    /// Duplicate snapshots are allowed.
    pub async fn save<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        name: &str,
        filter: &Filter,
        notify: bool,
    ) -> Result<SavedSearch, ApiError> {
        let name = name.trim();
        if filter.is_empty() {
            return Err(ApiError::Validation(
                "Set at least one filter before saving a search.".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(ApiError::Validation(
                "A saved search needs a name.".to_string(),
            ));
        }

        let created = api
            .create_saved_search(
                token,
                &NewSavedSearch {
                    name: name.to_string(),
                    filters: filter.clone(),
                    notify_new_listings: notify,
                },
            )
            .await?;
        tracing::info!("Saved search '{}' created with id {}", created.name, created.id);
        self.items.lock().await.insert(0, created.clone());
        Ok(created)
    }

    /// Optimistic alert toggle. The local flag flips immediately; the PUT is
    /// best-effort and a failure is only logged.
    pub async fn toggle_alert<C: MarketApi>(&self, api: &C, token: &str, id: i64, notify: bool) {
        {
            let mut items = self.items.lock().await;
            match items.iter_mut().find(|s| s.id == id) {
                Some(item) => item.notify_new_listings = notify,
                None => {
                    tracing::warn!("Alert toggle for unknown saved search {}", id);
                    return;
                }
            }
        }
        if let Err(e) = api.update_saved_search_alert(token, id, notify).await {
            tracing::warn!("Alert toggle for saved search {} not persisted: {}", id, e);
        }
    }

    /// Returns the stored filter snapshot wholesale; the caller replaces the
    /// active filter and re-triggers the feed.
    pub async fn apply(&self, id: i64) -> Option<Filter> {
        self.items
            .lock()
            .await
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.filters.clone())
    }

    pub async fn delete<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        id: i64,
    ) -> Result<(), ApiError> {
        api.delete_saved_search(token, id).await?;
        self.items.lock().await.retain(|s| s.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockApi;

    fn city_filter() -> Filter {
        Filter {
            city: "Berlin".to_string(),
            ..Filter::default()
        }
    }

    #[tokio::test]
    async fn empty_filter_is_rejected_without_network() {
        let mock = MockApi::new();
        let mgr = SavedSearchManager::new();
        let err = mgr
            .save(&mock, "t", "my search", &Filter::default(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty(), "no request may be sent");
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_network() {
        let mock = MockApi::new();
        let mgr = SavedSearchManager::new();
        let err = mgr
            .save(&mock, "t", "   ", &city_filter(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_save_prepends() {
        let mock = MockApi::new();
        let mgr = SavedSearchManager::new();
        mgr.save(&mock, "t", "first", &city_filter(), false)
            .await
            .unwrap();
        mgr.save(&mock, "t", "second", &city_filter(), true)
            .await
            .unwrap();
        let names: Vec<String> = mgr.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn duplicate_snapshots_may_coexist() {
        let mock = MockApi::new();
        let mgr = SavedSearchManager::new();
        mgr.save(&mock, "t", "same", &city_filter(), false)
            .await
            .unwrap();
        mgr.save(&mock, "t", "same", &city_filter(), false)
            .await
            .unwrap();
        assert_eq!(mgr.list().await.len(), 2);
    }

    #[tokio::test]
    async fn alert_toggle_keeps_local_state_on_backend_failure() {
        let mock = MockApi::new().failing_saved_search_update();
        let mgr = SavedSearchManager::new();
        let created = mgr
            .save(&mock, "t", "alerts", &city_filter(), false)
            .await
            .unwrap();
        mgr.toggle_alert(&mock, "t", created.id, true).await;
        let items = mgr.list().await;
        assert!(items[0].notify_new_listings, "optimistic flip sticks");
    }

    #[tokio::test]
    async fn delete_failure_keeps_the_item() {
        let mock = MockApi::new().failing_saved_search_delete();
        let mgr = SavedSearchManager::new();
        let created = mgr
            .save(&mock, "t", "keep", &city_filter(), false)
            .await
            .unwrap();
        assert!(mgr.delete(&mock, "t", created.id).await.is_err());
        assert_eq!(mgr.list().await.len(), 1);
    }

    #[tokio::test]
    async fn apply_returns_the_snapshot() {
        let mock = MockApi::new();
        let mgr = SavedSearchManager::new();
        let created = mgr
            .save(&mock, "t", "berlin", &city_filter(), false)
            .await
            .unwrap();
        let filter = mgr.apply(created.id).await.unwrap();
        assert_eq!(filter.city, "Berlin");
        assert!(mgr.apply(9999).await.is_none());
    }
}
