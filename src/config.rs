use crate::error::{ReviewError, Result};
use crate::types::{SortOrder, SourceQuery};
use serde::Deserialize;
use std::fs;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    pub google_play: GooglePlayConfig,
    pub app_store: AppStoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub dataset_path: String,
}

#[derive(Debug, Deserialize)]
pub struct GooglePlayConfig {
    pub app_id: String,
    pub lang: String,
    pub country: String,
    pub sort: String,
    pub max_reviews: usize,
}

#[derive(Debug, Deserialize)]
pub struct AppStoreConfig {
    pub app_id: String,
    pub country: String,
    pub sort: String,
    pub pages: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ReviewError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

impl GooglePlayConfig {
    pub fn to_query(&self) -> Result<SourceQuery> {
        Ok(SourceQuery {
            app_id: self.app_id.clone(),
            lang: self.lang.clone(),
            country: self.country.clone(),
            sort: SortOrder::from_str(&self.sort)?,
            max_reviews: self.max_reviews,
        })
    }
}

impl AppStoreConfig {
    /// The RSS feed serves fixed-size pages; max_reviews caps the total
    /// records kept after paging.
    pub fn to_query(&self) -> Result<SourceQuery> {
        Ok(SourceQuery {
            app_id: self.app_id.clone(),
            lang: String::new(),
            country: self.country.clone(),
            sort: SortOrder::from_str(&self.sort)?,
            max_reviews: self.pages * 50,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml_src = r#"
            [output]
            dataset_path = "output/reviews.csv"

            [google_play]
            app_id = "com.example.app"
            lang = "en"
            country = "us"
            sort = "newest"
            max_reviews = 600

            [app_store]
            app_id = "123456789"
            country = "us"
            sort = "newest"
            pages = 10
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.google_play.app_id, "com.example.app");
        let query = config.google_play.to_query().unwrap();
        assert_eq!(query.sort, SortOrder::Newest);
        assert_eq!(config.app_store.to_query().unwrap().max_reviews, 500);
    }
}
