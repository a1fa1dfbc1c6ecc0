// View-model structs mirroring the backend API's JSON payloads.
// The backend owns every one of these records; nothing here is persisted
// locally except the geolocation cache (see geo.rs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(default)]
    pub kyc_verified: bool,
    #[serde(default)]
    pub suspended: bool,
}

/// Token submitted by the login form; field name matches the HTML input.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "authToken")]
    pub auth_token: String,
}

// --- Catalogue ---

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "imageurl")]
    pub image_url: Option<String>,
    #[serde(rename = "sortorder", default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Available,
    Sold,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingImage {
    pub url: String,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub category_id: Option<i64>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Free-text location as entered by the seller ("Kreuzberg, 10997 Berlin").
    pub location: Option<String>,
    pub condition: Option<Condition>,
    pub phone: Option<String>,
    pub status: ListingStatus,
    pub moderation_status: ModerationStatus,
    pub user_id: i64,
    pub seller_name: Option<String>,
    #[serde(default)]
    pub seller_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ListingImage>,
}

impl Listing {
    /// URL of the main image, falling back to the first one.
    pub fn main_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|i| i.is_main)
            .or_else(|| self.images.first())
            .map(|i| i.url.as_str())
    }
}

/// Response of the personalized listings endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersonalizedListings {
    pub listings: Vec<Listing>,
    pub personalized: bool,
}

// --- Filtering ---

/// The active filter form. Empty string means "not set"; the whole form
/// counts as inactive when every field is empty.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    pub category: String,
    pub search: String,
    pub country: String,
    pub city: String,
    pub min_price: String,
    pub max_price: String,
    pub currency: String,
    pub condition: String,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Query parameters for the filtered listings endpoint, non-empty
    /// fields only, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.fields()
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k, v.trim().to_string()))
            .collect()
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("category", self.category.as_str()),
            ("search", self.search.as_str()),
            ("country", self.country.as_str()),
            ("city", self.city.as_str()),
            ("minPrice", self.min_price.as_str()),
            ("maxPrice", self.max_price.as_str()),
            ("currency", self.currency.as_str()),
            ("condition", self.condition.as_str()),
        ]
    }
}

// --- Saved searches ---

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub filters: Filter,
    pub notify_new_listings: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedSearch {
    pub name: String,
    pub filters: Filter,
    pub notify_new_listings: bool,
}

// --- Location ---

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Cached,
    Profile,
    Unknown,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub city: Option<String>,
    pub country: Option<String>,
    pub neighbourhood: Option<String>,
    pub postcode: Option<String>,
    pub accuracy: Option<f64>,
    pub source: LocationSource,
}

impl UserLocation {
    /// Short human label for the dashboard header.
    pub fn label(&self) -> String {
        match (&self.neighbourhood, &self.city, &self.country) {
            (Some(n), Some(c), _) => format!("{}, {}", n, c),
            (None, Some(c), _) => c.clone(),
            (None, None, Some(c)) => c.clone(),
            _ => "Unknown".to_string(),
        }
    }
}

// --- Onboarding ---

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingStatus {
    pub completed: bool,
    pub personalized: bool,
}

// --- Notifications ---

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// --- KYC ---

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub id: i64,
    pub user_id: i64,
    pub document_type: String,
    pub status: KycStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// --- Moderation ---

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub target_type: String,
    pub target_id: i64,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: i64,
    pub user_id: i64,
    pub reason: String,
    pub issued_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub id: i64,
    pub user_id: i64,
    pub reason: String,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lifted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: i64,
    pub user_id: i64,
    pub suspension_id: Option<i64>,
    pub text: String,
    pub status: AppealStatus,
    pub created_at: DateTime<Utc>,
}

/// One entry of the moderation queue. Every variant carries its own shape
/// and its own action set; rendering and dispatch match exhaustively.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModerationItem {
    Report(Report),
    Warning(Warning),
    Suspension(Suspension),
    Appeal(Appeal),
}

impl ModerationItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ModerationItem::Report(r) => r.created_at,
            ModerationItem::Warning(w) => w.created_at,
            ModerationItem::Suspension(s) => s.created_at,
            ModerationItem::Appeal(a) => a.created_at,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            ModerationItem::Report(_) => "Report",
            ModerationItem::Warning(_) => "Warning",
            ModerationItem::Suspension(_) => "Suspension",
            ModerationItem::Appeal(_) => "Appeal",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ModerationItem::Report(r) => {
                format!("{} #{} reported: {}", r.target_type, r.target_id, r.reason)
            }
            ModerationItem::Warning(w) => format!("Warning for user #{}: {}", w.user_id, w.reason),
            ModerationItem::Suspension(s) => {
                format!("User #{} suspended: {}", s.user_id, s.reason)
            }
            ModerationItem::Appeal(a) => format!("Appeal from user #{}: {}", a.user_id, a.text),
        }
    }

    /// Actions the backend would currently accept for this entry. Anything
    /// not listed here must not be offered or dispatched.
    pub fn allowed_actions(&self) -> &'static [&'static str] {
        match self {
            ModerationItem::Report(r) => match r.status {
                ReportStatus::Pending => &["resolve", "dismiss"],
                ReportStatus::Resolved | ReportStatus::Dismissed => &[],
            },
            ModerationItem::Warning(_) => &[],
            ModerationItem::Suspension(s) => {
                if s.lifted {
                    &[]
                } else {
                    &["lift"]
                }
            }
            ModerationItem::Appeal(a) => match a.status {
                AppealStatus::Pending => &["approve", "reject"],
                AppealStatus::Approved | AppealStatus::Rejected => &[],
            },
        }
    }
}

/// Server-side aggregates for the admin dashboard. These are the single
/// source of truth for counts; no tallies are derived from the in-memory
/// lists.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportStats {
    pub pending: i64,
    pub resolved: i64,
    pub dismissed: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with_search(s: &str) -> Filter {
        Filter {
            search: s.to_string(),
            ..Filter::default()
        }
    }

    #[test]
    fn empty_filter_has_no_query_pairs() {
        let f = Filter::default();
        assert!(f.is_empty());
        assert!(f.query_pairs().is_empty());
    }

    #[test]
    fn single_field_serializes_alone() {
        let f = filter_with_search("phone");
        assert!(!f.is_empty());
        assert_eq!(f.query_pairs(), vec![("search", "phone".to_string())]);
    }

    #[test]
    fn whitespace_only_fields_count_as_empty() {
        let f = filter_with_search("   ");
        assert!(f.is_empty());
        assert!(f.query_pairs().is_empty());
    }

    #[test]
    fn moderation_actions_follow_status() {
        let report = ModerationItem::Report(Report {
            id: 1,
            reporter_id: 2,
            target_type: "listing".into(),
            target_id: 3,
            reason: "spam".into(),
            details: None,
            status: ReportStatus::Dismissed,
            created_at: Utc::now(),
        });
        assert!(report.allowed_actions().is_empty());

        let appeal = ModerationItem::Appeal(Appeal {
            id: 1,
            user_id: 2,
            suspension_id: None,
            text: "please".into(),
            status: AppealStatus::Pending,
            created_at: Utc::now(),
        });
        assert_eq!(appeal.allowed_actions(), &["approve", "reject"]);
    }

    #[test]
    fn moderation_item_tag_round_trips() {
        let item = ModerationItem::Warning(Warning {
            id: 9,
            user_id: 4,
            reason: "tone".into(),
            issued_by: 1,
            created_at: Utc::now(),
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "warning");
        let back: ModerationItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind_label(), "Warning");
    }
}
