/// Source name constants to ensure consistency across the codebase

pub const GOOGLE_PLAY_SOURCE: &str = "google_play";
pub const APP_STORE_SOURCE: &str = "app_store";

/// Get all supported source names
pub fn supported_sources() -> Vec<&'static str> {
    vec![GOOGLE_PLAY_SOURCE, APP_STORE_SOURCE]
}
