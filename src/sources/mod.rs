pub mod app_store;
pub mod google_play;

pub use app_store::AppStoreSource;
pub use google_play::GooglePlaySource;
