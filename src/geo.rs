// Best-effort location resolution. The page reports raw coordinates; we
// reverse-geocode them through a third-party service and keep the result in
// a per-user cache file for six hours. The feed never waits for any of this:
// a cached entry is applied immediately at session start, a fresh fix only
// re-sorts what is already on screen.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{LocationSource, UserLocation};

pub const CACHE_MAX_AGE_HOURS: i64 = 6;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    location: UserLocation,
    cached_at: DateTime<Utc>,
}

pub struct GeoResolver {
    geocode_url: String,
    cache_dir: PathBuf,
}

impl GeoResolver {
    pub fn new(geocode_url: &str, cache_dir: &Path) -> Self {
        Self {
            geocode_url: geocode_url.to_string(),
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    fn cache_path(&self, user_id: i64) -> PathBuf {
        self.cache_dir.join(format!("user_location_{}.json", user_id))
    }

    /// Reads the cached location for a user. Entries older than six hours,
    /// missing files and unparsable files all come back as `None`.
    pub fn load_cached(&self, user_id: i64) -> Option<UserLocation> {
        let path = self.cache_path(user_id);
        let content = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Discarding unparsable location cache {:?}: {}", path, e);
                return None;
            }
        };
        if Utc::now() - entry.cached_at > Duration::hours(CACHE_MAX_AGE_HOURS) {
            tracing::debug!("Location cache for user {} expired", user_id);
            return None;
        }
        let mut location = entry.location;
        location.source = LocationSource::Cached;
        Some(location)
    }

    /// Reverse-geocodes a fresh coordinate pair and persists it. Failures
    /// bubble up so the caller can record an error string; the cache is left
    /// untouched in that case.
    pub async fn resolve(
        &self,
        http: &reqwest::Client,
        user_id: i64,
        lat: f64,
        lon: f64,
        accuracy: Option<f64>,
    ) -> Result<UserLocation> {
        let response = http
            .get(&self.geocode_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "jsonv2".to_string()),
            ])
            .send()
            .await
            .context("reverse geocode request failed")?
            .error_for_status()
            .context("reverse geocode service rejected the request")?;

        let body: ReverseGeocodeResponse = response
            .json()
            .await
            .context("reverse geocode response was not valid JSON")?;
        let address = body.address.unwrap_or_default();

        let location = UserLocation {
            city: address.city.or(address.town).or(address.village),
            country: address.country,
            neighbourhood: address.neighbourhood.or(address.suburb),
            postcode: address.postcode,
            accuracy,
            source: LocationSource::Gps,
        };
        tracing::info!("Resolved location for user {}: {}", user_id, location.label());

        self.store(user_id, &location);
        Ok(location)
    }

    fn store(&self, user_id: i64, location: &UserLocation) {
        let entry = CacheEntry {
            location: location.clone(),
            cached_at: Utc::now(),
        };
        let write = fs::create_dir_all(&self.cache_dir).and_then(|_| {
            fs::write(
                self.cache_path(user_id),
                serde_json::to_vec(&entry).expect("cache entry serializes"),
            )
        });
        if let Err(e) = write {
            // Cache writes are best-effort; the session still has the fix.
            tracing::warn!("Could not persist location cache for user {}: {}", user_id, e);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    address: Option<GeoAddress>,
}

#[derive(Debug, Deserialize, Default)]
struct GeoAddress {
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(test: &str) -> GeoResolver {
        let dir = std::env::temp_dir()
            .join(format!("marketfront-geo-{}-{}", std::process::id(), test));
        let _ = fs::remove_dir_all(&dir);
        GeoResolver::new("http://127.0.0.1:1/reverse", &dir)
    }

    fn berlin() -> UserLocation {
        UserLocation {
            city: Some("Berlin".into()),
            country: Some("Germany".into()),
            neighbourhood: Some("Kreuzberg".into()),
            postcode: Some("10997".into()),
            accuracy: Some(25.0),
            source: LocationSource::Gps,
        }
    }

    fn write_entry(r: &GeoResolver, user_id: i64, age_hours: i64) {
        let entry = CacheEntry {
            location: berlin(),
            cached_at: Utc::now() - Duration::hours(age_hours),
        };
        fs::create_dir_all(&r.cache_dir).unwrap();
        fs::write(
            r.cache_path(user_id),
            serde_json::to_vec(&entry).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn fresh_entry_is_applied_as_cached() {
        let r = resolver("fresh");
        write_entry(&r, 1, 5);
        let loc = r.load_cached(1).expect("5h old entry is still valid");
        assert_eq!(loc.source, LocationSource::Cached);
        assert_eq!(loc.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn seven_hour_old_entry_is_ignored() {
        let r = resolver("stale");
        write_entry(&r, 1, 7);
        assert!(r.load_cached(1).is_none());
    }

    #[test]
    fn missing_and_garbage_files_are_ignored() {
        let r = resolver("garbage");
        assert!(r.load_cached(1).is_none());
        fs::create_dir_all(&r.cache_dir).unwrap();
        fs::write(r.cache_path(2), b"not json at all").unwrap();
        assert!(r.load_cached(2).is_none());
    }

    #[test]
    fn store_then_load_round_trips() {
        let r = resolver("roundtrip");
        r.store(42, &berlin());
        let loc = r.load_cached(42).unwrap();
        assert_eq!(loc.postcode.as_deref(), Some("10997"));
        assert_eq!(loc.source, LocationSource::Cached);
    }
}
