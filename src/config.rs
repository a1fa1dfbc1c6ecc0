// Runtime configuration, loaded once at startup.
// Sources, in override order: built-in defaults, an optional config file,
// APP_-prefixed environment variables (plus .env via dotenv).

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Address this front-end binds to.
    pub server_address: String,
    /// Origin of the backend API, e.g. "https://api.example.com". All
    /// `/api/*` paths are resolved against it.
    pub api_url: String,
    /// Where a 401 sends the browser.
    pub login_endpoint: String,
    /// Where a 401 on an admin surface sends the browser.
    pub admin_login_endpoint: String,
    /// Reverse-geocoding service; receives lat/lon query parameters.
    pub geocode_url: String,
    /// Public VAPID key handed to the page for push subscriptions.
    pub vapid_public_key: Option<String>,
    /// Directory for the per-user geolocation cache files.
    pub cache_dir: PathBuf,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("api_url", "http://127.0.0.1:8080")?
            .set_default("login_endpoint", "/login")?
            .set_default("admin_login_endpoint", "/login")?
            .set_default(
                "geocode_url",
                "https://nominatim.openstreetmap.org/reverse",
            )?
            .set_default("cache_dir", "cache")?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_API_URL)
            .add_source(Environment::with_prefix("APP"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_file_or_env() {
        let settings = Settings::new().expect("defaults should deserialize");
        assert_eq!(settings.login_endpoint, "/login");
        assert!(!settings.api_url.is_empty());
    }
}
