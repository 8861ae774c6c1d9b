//! Administrator directory backed by the Users sheet.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::KeyedCache;
use crate::config::StoreConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{Row, SheetsGateway};
use crate::keys;
use crate::limiter::RateLimiter;
use crate::schema::{users_col, ADMIN_ROLE};

/// Set of administrator emails, lowercased.
pub type AdminSet = Arc<HashSet<String>>;

/// Resolves whether an email belongs to an administrator.
///
/// The Users sheet is read at most once per TTL. When the read fails for any
/// reason the static fallback list answers instead, and nothing is cached so
/// the next call tries the sheet again.
pub struct AdminDirectory {
    gateway: Arc<dyn SheetsGateway>,
    limiter: Arc<RateLimiter>,
    cache: KeyedCache<AdminSet>,
    users_sheet: String,
    ttl: Duration,
    fallback: AdminSet,
}

impl AdminDirectory {
    /// Create a directory over `gateway`, sharing `limiter` with other callers.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn SheetsGateway>,
        limiter: Arc<RateLimiter>,
        config: &StoreConfig,
    ) -> Self {
        let fallback = config
            .fallback_admins
            .iter()
            .map(|email| normalize(email))
            .filter(|email| !email.is_empty())
            .collect();
        Self {
            gateway,
            limiter,
            cache: KeyedCache::bounded(1),
            users_sheet: config.users_sheet.clone(),
            ttl: config.admin_cache_ttl,
            fallback: Arc::new(fallback),
        }
    }

    /// Whether `email` is an administrator. Never fails.
    pub async fn is_admin(&self, email: &str) -> bool {
        let email = normalize(email);
        if email.is_empty() {
            return false;
        }
        self.admin_emails().await.contains(&email)
    }

    /// The current administrator set, from cache, the sheet or the fallback.
    pub async fn admin_emails(&self) -> AdminSet {
        let key = keys::admin_emails();
        if let Some(admins) = self.cache.get(&key).await {
            debug!("admin set cache hit");
            return admins;
        }

        let read = self
            .limiter
            .execute(|| self.gateway.read_rows(&self.users_sheet))
            .await;
        match read.and_then(|rows| parse_admins(&rows)) {
            Ok(admins) => {
                debug!(count = admins.len(), "loaded admin set from users sheet");
                let admins = Arc::new(admins);
                self.cache.set(key, Arc::clone(&admins), self.ttl).await;
                admins
            }
            Err(e) => {
                warn!(error = %e, "users sheet unavailable, using fallback admin list");
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Drop the cached set so the next check re-reads the sheet.
    pub async fn invalidate(&self) {
        self.cache.delete(&keys::admin_emails()).await;
    }

    /// Whether `email` is on the static fallback list.
    #[must_use]
    pub fn is_fallback_admin(&self, email: &str) -> bool {
        self.fallback.contains(&normalize(email))
    }
}

impl std::fmt::Debug for AdminDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminDirectory")
            .field("users_sheet", &self.users_sheet)
            .field("ttl", &self.ttl)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Extract administrator emails from Users sheet rows.
///
/// The first row is the header; the email and role columns are found by name,
/// case-insensitively.
///
/// # Errors
///
/// Returns `GatewayError::Malformed` if the sheet is empty or a column is missing.
pub fn parse_admins(rows: &[Row]) -> Result<HashSet<String>> {
    let header = rows
        .first()
        .ok_or_else(|| GatewayError::Malformed("users sheet has no header row".into()))?;
    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| GatewayError::Malformed(format!("users sheet has no {name} column")))
    };
    let email_col = column(users_col::EMAIL)?;
    let role_col = column(users_col::ROLE)?;

    Ok(rows
        .iter()
        .skip(1)
        .filter(|row| {
            row.get(role_col)
                .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        })
        .filter_map(|row| row.get(email_col).map(|email| normalize(email)))
        .filter(|email| !email.is_empty())
        .collect())
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
