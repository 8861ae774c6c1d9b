//! Gateway and mailer configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Google Sheets v4 REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Google OAuth token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth scope for reading and writing spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Where the service account key file is looked for, in order.
pub const SECRETS_PATHS: [&str; 3] = [
    ".secrets/google-service-account.json",
    "storefront/.secrets/google-service-account.json",
    "../.secrets/google-service-account.json",
];

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No spreadsheet ID was configured.
    #[error("SPREADSHEET_ID is not set")]
    MissingSpreadsheetId,

    /// Neither a service account nor an access token was found.
    #[error("no Google credentials found (secrets file, GOOGLE_SERVICE_ACCOUNT_EMAIL/GOOGLE_PRIVATE_KEY or GOOGLE_ACCESS_TOKEN)")]
    MissingCredentials,

    /// A secrets file exists but could not be used.
    #[error("invalid secrets file {}: {message}", .path.display())]
    InvalidSecretsFile {
        /// File path.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
}

/// A Google service account key, as downloaded from the cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account email, used as the assertion issuer.
    pub client_email: String,

    /// PEM-encoded RSA private key.
    pub private_key: String,

    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

/// How the gateway authenticates.
#[derive(Clone)]
pub enum Credentials {
    /// Mint short-lived tokens from a service account key.
    ServiceAccount(ServiceAccountKey),

    /// Use a pre-issued bearer token as-is.
    AccessToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Self::AccessToken(_) => f.debug_tuple("AccessToken").field(&"[redacted]").finish(),
        }
    }
}

/// Spreadsheet gateway configuration.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Sheets API base URL (default: [`DEFAULT_API_BASE_URL`]).
    pub api_base_url: String,

    /// ID of the spreadsheet holding the Orders and Users sheets.
    pub spreadsheet_id: String,

    /// Authentication.
    pub credentials: Credentials,

    /// Per-request timeout (default: 30 seconds).
    pub request_timeout: Duration,
}

impl SheetsConfig {
    /// Create a configuration with default endpoint and timeout.
    #[must_use]
    pub fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from a secrets file and environment variables.
    ///
    /// Credentials come from the first readable service account file
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, then [`SECRETS_PATHS`]), then from
    /// `GOOGLE_SERVICE_ACCOUNT_EMAIL` and `GOOGLE_PRIVATE_KEY`, then from
    /// `GOOGLE_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the spreadsheet ID or credentials are missing, or a
    /// secrets file is unreadable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let mut paths: Vec<PathBuf> = lookup("GOOGLE_APPLICATION_CREDENTIALS")
            .map(PathBuf::from)
            .into_iter()
            .collect();
        paths.extend(SECRETS_PATHS.iter().map(PathBuf::from));
        Self::from_sources(&paths, lookup)
    }

    fn from_sources(
        secret_paths: &[PathBuf],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let spreadsheet_id = lookup("SPREADSHEET_ID").ok_or(ConfigError::MissingSpreadsheetId)?;
        let credentials = load_credentials(secret_paths, &lookup)?;

        let mut config = Self::new(spreadsheet_id.trim(), credentials);
        if let Some(url) = lookup("SHEETS_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }
        if let Some(seconds) = lookup("SHEETS_REQUEST_TIMEOUT_SECONDS").and_then(|s| s.parse().ok()) {
            config.request_timeout = Duration::from_secs(seconds);
        }
        Ok(config)
    }
}

fn load_credentials(
    secret_paths: &[PathBuf],
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    for path in secret_paths {
        if let Some(key) = load_secrets_file(path)? {
            tracing::info!(path = %path.display(), "Loaded Google service account from file");
            return Ok(Credentials::ServiceAccount(key));
        }
    }

    // Fall back to environment variables
    tracing::debug!("Google service account file not found, using environment variables");
    if let (Some(client_email), Some(private_key)) = (
        lookup("GOOGLE_SERVICE_ACCOUNT_EMAIL"),
        lookup("GOOGLE_PRIVATE_KEY"),
    ) {
        return Ok(Credentials::ServiceAccount(ServiceAccountKey {
            client_email,
            // keys pasted into env files usually carry escaped newlines
            private_key: private_key.replace("\\n", "\n"),
            token_uri: lookup("GOOGLE_TOKEN_URI").unwrap_or_else(default_token_uri),
        }));
    }
    lookup("GOOGLE_ACCESS_TOKEN")
        .map(Credentials::AccessToken)
        .ok_or(ConfigError::MissingCredentials)
}

/// Read a service account key file. A missing file is `Ok(None)`.
fn load_secrets_file(path: &Path) -> Result<Option<ServiceAccountKey>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let invalid = |message: String| ConfigError::InvalidSecretsFile {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}

/// Mail relay configuration.
#[derive(Clone)]
pub struct MailerConfig {
    /// Relay base URL; emails are posted to `{base_url}/emails`.
    pub base_url: String,

    /// Relay API key.
    pub api_key: String,

    /// Sender address.
    pub from: String,

    /// Per-request timeout (default: 10 seconds).
    pub request_timeout: Duration,
}

impl MailerConfig {
    /// Create a configuration with the default timeout.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            from: from.into(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Load from `MAIL_RELAY_URL`, `MAIL_RELAY_API_KEY` and `MAIL_FROM`.
    ///
    /// Returns `None` when the relay is not configured, in which case
    /// notifications are disabled.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let base_url = lookup("MAIL_RELAY_URL")?;
        let api_key = lookup("MAIL_RELAY_API_KEY")?;
        let from = lookup("MAIL_FROM").unwrap_or_else(|| "orders@storefront.example".into());
        Some(Self::new(base_url, api_key, from))
    }
}

impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("from", &self.from)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
