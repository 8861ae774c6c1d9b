//! Store configuration.

use std::time::Duration;

use crate::limiter::RateLimiterConfig;
use crate::schema::{ORDERS_SHEET, USERS_SHEET};

/// Administrators recognised when the Users sheet cannot be read.
pub const DEFAULT_ADMIN_EMAILS: &[&str] = &["admin@storefront.example"];

/// Configuration for the order store and admin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Orders sheet name (default: "Orders").
    pub orders_sheet: String,

    /// Users sheet name (default: "Users").
    pub users_sheet: String,

    /// How long order lookups stay cached (default: 2 minutes).
    pub order_cache_ttl: Duration,

    /// How long the admin set stays cached (default: 5 minutes).
    pub admin_cache_ttl: Duration,

    /// Maximum cached entries; `None` is unbounded.
    pub cache_capacity: Option<usize>,

    /// Spreadsheet call limits.
    pub rate_limit: RateLimiterConfig,

    /// Static admin list used when the Users sheet is unavailable.
    pub fallback_admins: Vec<String>,

    /// Address copied on new-order notifications.
    pub admin_notification_email: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            orders_sheet: ORDERS_SHEET.into(),
            users_sheet: USERS_SHEET.into(),
            order_cache_ttl: Duration::from_secs(2 * 60),
            admin_cache_ttl: Duration::from_secs(5 * 60),
            cache_capacity: Some(1024),
            rate_limit: RateLimiterConfig::default(),
            fallback_admins: DEFAULT_ADMIN_EMAILS.iter().map(|e| (*e).to_string()).collect(),
            admin_notification_email: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u64>().ok());
        let minutes = |name: &str, default: Duration| {
            parsed(name).map_or(default, |m| Duration::from_secs(m.saturating_mul(60)))
        };

        let fallback_admins = lookup("ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.fallback_admins);

        Self {
            orders_sheet: lookup("ORDERS_SHEET").unwrap_or(defaults.orders_sheet),
            users_sheet: lookup("USERS_SHEET").unwrap_or(defaults.users_sheet),
            order_cache_ttl: minutes("ORDER_CACHE_TTL_MINUTES", defaults.order_cache_ttl),
            admin_cache_ttl: minutes("ADMIN_CACHE_TTL_MINUTES", defaults.admin_cache_ttl),
            cache_capacity: match parsed("CACHE_CAPACITY") {
                Some(0) => None,
                Some(n) => usize::try_from(n).ok(),
                None => defaults.cache_capacity,
            },
            rate_limit: RateLimiterConfig {
                max_concurrent: parsed("SHEETS_MAX_CONCURRENT")
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(defaults.rate_limit.max_concurrent),
                min_interval: parsed("SHEETS_MIN_INTERVAL_MS")
                    .map_or(defaults.rate_limit.min_interval, Duration::from_millis),
            },
            fallback_admins,
            admin_notification_email: lookup("ADMIN_NOTIFICATION_EMAIL")
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
        }
    }
}
