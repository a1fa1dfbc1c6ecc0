// Proximity-first ordering of the listing feed.
//
// Rank per listing, given the viewer's location:
//   0  free-text location mentions the viewer's neighbourhood or postcode
//   1  same city (exact, case-insensitive)
//   2  same country
//   3  everything else
// Ties break by creation time, newest first. The sort is stable, so equal
// (rank, timestamp) pairs keep their incoming order.

use crate::models::{Listing, UserLocation};

pub fn sort_listings_by_location(items: &[Listing], location: Option<&UserLocation>) -> Vec<Listing> {
    let mut out = items.to_vec();
    resort_in_place(&mut out, location);
    out
}

/// In-place variant used when a location arrives after the feed was fetched;
/// a `None` location leaves the order untouched.
pub fn resort_in_place(items: &mut [Listing], location: Option<&UserLocation>) {
    let Some(loc) = location else { return };
    items.sort_by(|a, b| {
        location_rank(a, loc)
            .cmp(&location_rank(b, loc))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn location_rank(listing: &Listing, loc: &UserLocation) -> u8 {
    let free_text = listing.location.as_deref().unwrap_or("");
    if contains_ci(free_text, loc.neighbourhood.as_deref())
        || contains_ci(free_text, loc.postcode.as_deref())
    {
        return 0;
    }
    if eq_ci(listing.city.as_deref(), loc.city.as_deref()) {
        return 1;
    }
    if eq_ci(listing.country.as_deref(), loc.country.as_deref()) {
        return 2;
    }
    3
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        Some(n) if !n.trim().is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
        _ => false,
    }
}

fn eq_ci(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if !b.trim().is_empty() => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingStatus, LocationSource, ModerationStatus};
    use chrono::{Duration, Utc};

    fn listing(id: i64, city: &str, country: &str, location: &str, age_hours: i64) -> Listing {
        Listing {
            id,
            title: format!("listing {}", id),
            description: String::new(),
            price: 10.0,
            currency: "EUR".into(),
            category_id: None,
            country: Some(country.to_string()),
            city: Some(city.to_string()),
            location: Some(location.to_string()),
            condition: None,
            phone: None,
            status: ListingStatus::Available,
            moderation_status: ModerationStatus::Approved,
            user_id: 1,
            seller_name: None,
            seller_verified: false,
            created_at: Utc::now() - Duration::hours(age_hours),
            images: vec![],
        }
    }

    fn viewer(city: &str, country: &str, neighbourhood: Option<&str>, postcode: Option<&str>) -> UserLocation {
        UserLocation {
            city: Some(city.to_string()),
            country: Some(country.to_string()),
            neighbourhood: neighbourhood.map(str::to_string),
            postcode: postcode.map(str::to_string),
            accuracy: None,
            source: LocationSource::Gps,
        }
    }

    fn ids(items: &[Listing]) -> Vec<i64> {
        items.iter().map(|l| l.id).collect()
    }

    #[test]
    fn no_location_is_a_stable_no_op() {
        let items = vec![
            listing(3, "Berlin", "DE", "", 1),
            listing(1, "Hamburg", "DE", "", 5),
            listing(2, "Munich", "DE", "", 3),
        ];
        let sorted = sort_listings_by_location(&items, None);
        assert_eq!(ids(&sorted), ids(&items));
    }

    #[test]
    fn city_match_beats_country_match() {
        // A matches the viewer's city, B only the viewer's country.
        let a = listing(1, "Berlin", "FR", "", 10);
        let b = listing(2, "Lyon", "DE", "", 1);
        let loc = viewer("Berlin", "DE", None, None);
        let sorted = sort_listings_by_location(&[b, a], Some(&loc));
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn neighbourhood_substring_outranks_city() {
        let near = listing(1, "Potsdam", "DE", "Kreuzberg, 10997 Berlin", 50);
        let same_city = listing(2, "Berlin", "DE", "somewhere else", 1);
        let loc = viewer("Berlin", "DE", Some("kreuzberg"), None);
        let sorted = sort_listings_by_location(&[same_city, near], Some(&loc));
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn postcode_substring_counts_as_rank_zero() {
        let near = listing(1, "Potsdam", "DE", "Flat near 10997", 50);
        let far = listing(2, "Rome", "IT", "", 1);
        let loc = viewer("Berlin", "DE", None, Some("10997"));
        let sorted = sort_listings_by_location(&[far, near], Some(&loc));
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn equal_rank_orders_newest_first() {
        let older = listing(1, "Berlin", "DE", "", 48);
        let newer = listing(2, "Berlin", "DE", "", 2);
        let loc = viewer("Berlin", "DE", None, None);
        let sorted = sort_listings_by_location(&[older, newer], Some(&loc));
        assert_eq!(ids(&sorted), vec![2, 1]);
    }

    #[test]
    fn identical_rank_and_timestamp_keep_incoming_order() {
        let ts = Utc::now();
        let mut a = listing(1, "Berlin", "DE", "", 0);
        let mut b = listing(2, "Berlin", "DE", "", 0);
        a.created_at = ts;
        b.created_at = ts;
        let loc = viewer("Berlin", "DE", None, None);
        let sorted = sort_listings_by_location(&[a, b], Some(&loc));
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn empty_neighbourhood_never_matches() {
        // An empty needle must not pull everything to rank 0.
        let x = listing(1, "Rome", "IT", "anything at all", 1);
        let y = listing(2, "Berlin", "DE", "", 5);
        let mut loc = viewer("Berlin", "DE", Some(""), Some(" "));
        loc.city = Some("Berlin".into());
        let sorted = sort_listings_by_location(&[x, y], Some(&loc));
        assert_eq!(ids(&sorted), vec![2, 1]);
    }
}
