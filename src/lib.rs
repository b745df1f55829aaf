pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod layout;
pub mod reporter;
pub mod state;
pub mod types;

/// Polymarket data API base URL (public, no auth required)
pub const DATA_API_BASE: &str = "https://data-api.polymarket.com";

/// Polymarket profile endpoint (name, pseudonym, profile image)
pub const PROFILE_API_URL: &str = "https://polymarket.com/api/profile/userData";
