use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::warn;

use crate::filter::{DEFAULT_LANGUAGE, FilterCriteria};

/// Run configuration, read once at startup and passed down by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Base for `auction_url`. `None` disables URL synthesis.
    pub link_base: Option<String>,
    pub page_size: usize,
    pub language_code: String,
    pub display_language: String,
    pub min_bids: Option<i64>,
    pub max_bids: Option<i64>,
    pub hours_before_end: Option<f64>,
    pub locations: Vec<String>,
    pub save_results: bool,
    pub results_dir: PathBuf,
    pub export_xlsx: bool,
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.aurena.at/posten";
    pub const DEFAULT_PAGE_SIZE: usize = 200;
    pub const DEFAULT_RESULTS_DIR: &'static str = "results";

    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get("API_URL")
            .ok_or_else(|| anyhow!("Missing required environment variable: API_URL"))?;

        let link_base = match lookup("BASE_URL") {
            None => Some(Self::DEFAULT_BASE_URL.to_string()),
            Some(raw) => Some(raw.trim().trim_end_matches('/').to_string()).filter(|b| !b.is_empty()),
        };

        let page_size = match parse_number::<usize>(&get, "LIMIT_PER_REQUEST") {
            Some(0) => {
                warn!("LIMIT_PER_REQUEST must be at least 1, using {}", Self::DEFAULT_PAGE_SIZE);
                Self::DEFAULT_PAGE_SIZE
            }
            Some(size) => size,
            None => Self::DEFAULT_PAGE_SIZE,
        };

        let hours_before_end = match parse_number::<f64>(&get, "HOURS_BEFORE_END") {
            Some(hours) if !hours.is_finite() || hours < 0.0 => {
                warn!("Invalid value for HOURS_BEFORE_END: '{}'. Ignoring.", hours);
                None
            }
            other => other,
        };

        let locations = get("LOCATIONS")
            .map(|raw| {
                raw.split(',')
                    .map(|loc| loc.trim().to_uppercase())
                    .filter(|loc| !loc.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api_url,
            link_base,
            page_size,
            language_code: get("LANGUAGE_CODE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            display_language: get("DISPLAY_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            min_bids: parse_number(&get, "MIN_BIDS"),
            max_bids: parse_number(&get, "MAX_BIDS"),
            hours_before_end,
            locations,
            save_results: parse_flag(&get, "SAVE_RESULTS", true),
            results_dir: get("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_RESULTS_DIR)),
            export_xlsx: parse_flag(&get, "EXPORT_XLSX", false),
        })
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::new(self.language_code.as_str())
            .with_bids(self.min_bids, self.max_bids)
            .with_hours_before_end(self.hours_before_end)
            .with_locations(&self.locations)
            .with_display_language(self.display_language.as_str())
    }
}

fn parse_number<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid value for {}: '{}'. Ignoring.", key, raw);
            None
        }
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    let Some(raw) = get(key) else {
        return default;
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => {
            warn!("Invalid value for {}: '{}'. Using {}.", key, raw, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn api_url_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("API_URL", "  ")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("API_URL", "https://api.test/package/1")]).unwrap();
        assert_eq!(cfg.page_size, 200);
        assert_eq!(cfg.language_code, "de_DE");
        assert_eq!(cfg.display_language, "de_DE");
        assert_eq!(cfg.link_base.as_deref(), Some(Config::DEFAULT_BASE_URL));
        assert_eq!(cfg.min_bids, None);
        assert_eq!(cfg.max_bids, None);
        assert_eq!(cfg.hours_before_end, None);
        assert!(cfg.locations.is_empty());
        assert!(cfg.save_results);
        assert!(!cfg.export_xlsx);
        assert_eq!(cfg.results_dir, PathBuf::from("results"));
    }

    #[test]
    fn explicit_values_are_read() {
        let cfg = config(&[
            ("API_URL", "https://api.test"),
            ("BASE_URL", "https://x/posten/"),
            ("LIMIT_PER_REQUEST", "500"),
            ("LANGUAGE_CODE", "en_GB"),
            ("MIN_BIDS", "1"),
            ("MAX_BIDS", "4"),
            ("HOURS_BEFORE_END", "12.5"),
            ("LOCATIONS", "ooe, w,,stmk"),
            ("SAVE_RESULTS", "FALSE"),
            ("EXPORT_XLSX", "yes"),
        ])
        .unwrap();

        assert_eq!(cfg.link_base.as_deref(), Some("https://x/posten"));
        assert_eq!(cfg.page_size, 500);
        assert_eq!(cfg.language_code, "en_GB");
        assert_eq!(cfg.display_language, "de_DE");
        assert_eq!(cfg.min_bids, Some(1));
        assert_eq!(cfg.max_bids, Some(4));
        assert_eq!(cfg.hours_before_end, Some(12.5));
        assert_eq!(cfg.locations, vec!["OOE", "W", "STMK"]);
        assert!(!cfg.save_results);
        assert!(cfg.export_xlsx);
    }

    #[test]
    fn invalid_numbers_are_ignored() {
        let cfg = config(&[
            ("API_URL", "https://api.test"),
            ("MIN_BIDS", "lots"),
            ("HOURS_BEFORE_END", "-3"),
            ("LIMIT_PER_REQUEST", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.min_bids, None);
        assert_eq!(cfg.hours_before_end, None);
        assert_eq!(cfg.page_size, Config::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn blank_base_url_disables_links() {
        let cfg = config(&[("API_URL", "https://api.test"), ("BASE_URL", "")]).unwrap();
        assert_eq!(cfg.link_base, None);
    }

    #[test]
    fn criteria_carry_config_values() {
        let cfg = config(&[
            ("API_URL", "https://api.test"),
            ("MIN_BIDS", "2"),
            ("HOURS_BEFORE_END", "24"),
            ("LOCATIONS", "w"),
            ("DISPLAY_LANGUAGE", "en_GB"),
        ])
        .unwrap();
        let criteria = cfg.criteria();
        assert_eq!(criteria.min_bids(), Some(2));
        assert_eq!(criteria.hours_before_end(), Some(24.0));
        assert_eq!(criteria.province_codes(), ["W".to_string()]);
        assert_eq!(criteria.display_language(), "en_GB");
        assert_eq!(criteria.language_code(), "de_DE");
    }
}
