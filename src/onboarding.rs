// One-time personalization gate: collects category preferences (at least
// five) or an explicit skip, either of which flips the server-side
// personalized flag consumed by the listings fetch.

use std::sync::Mutex;

use crate::api_client::{ApiError, MarketApi};
use crate::models::OnboardingStatus;

pub const MIN_CATEGORIES: usize = 5;

pub struct OnboardingGate {
    status: Mutex<OnboardingStatus>,
}

impl Default for OnboardingGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingGate {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(OnboardingStatus::default()),
        }
    }

    pub fn hydrate(&self, status: OnboardingStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Whether the modal should be shown on this session.
    pub fn needs_onboarding(&self) -> bool {
        !self.status.lock().unwrap().completed
    }

    pub async fn choose_categories<C: MarketApi>(
        &self,
        api: &C,
        token: &str,
        category_ids: &[i64],
    ) -> Result<(), ApiError> {
        let mut unique: Vec<i64> = category_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() < MIN_CATEGORIES {
            return Err(ApiError::Validation(format!(
                "Pick at least {} categories to personalize your feed.",
                MIN_CATEGORIES
            )));
        }
        api.save_category_preferences(token, &unique).await?;
        let mut status = self.status.lock().unwrap();
        status.completed = true;
        status.personalized = true;
        Ok(())
    }

    pub async fn skip<C: MarketApi>(&self, api: &C, token: &str) -> Result<(), ApiError> {
        api.skip_onboarding(token).await?;
        let mut status = self.status.lock().unwrap();
        status.completed = true;
        status.personalized = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockApi;

    #[tokio::test]
    async fn too_few_categories_rejected_without_network() {
        let mock = MockApi::new();
        let gate = OnboardingGate::new();
        let err = gate
            .choose_categories(&mock, "t", &[1, 2, 3, 4])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty());
        assert!(gate.needs_onboarding());
    }

    #[tokio::test]
    async fn duplicates_do_not_count_towards_the_minimum() {
        let mock = MockApi::new();
        let gate = OnboardingGate::new();
        let err = gate
            .choose_categories(&mock, "t", &[1, 1, 2, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn five_categories_complete_the_gate() {
        let mock = MockApi::new();
        let gate = OnboardingGate::new();
        gate.choose_categories(&mock, "t", &[1, 2, 3, 4, 5])
            .await
            .unwrap();
        assert!(!gate.needs_onboarding());
        assert_eq!(mock.calls(), vec!["POST /api/preferences/categories"]);
    }

    #[tokio::test]
    async fn skip_completes_without_personalizing() {
        let mock = MockApi::new();
        let gate = OnboardingGate::new();
        gate.skip(&mock, "t").await.unwrap();
        assert!(!gate.needs_onboarding());
        assert_eq!(mock.calls(), vec!["POST /api/preferences/skip-onboarding"]);
    }
}
