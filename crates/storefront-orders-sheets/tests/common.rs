//! Common test utilities for the Sheets and mail relay adapters.

#![allow(dead_code)] // Some utilities are used by different test files

use storefront_orders_sheets::{Credentials, ServiceAccountKey, SheetsClient, SheetsConfig};
use wiremock::MockServer;

/// Spreadsheet ID used by every test client.
pub const SPREADSHEET_ID: &str = "sheet-1";

/// Static bearer token used by [`token_client`].
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Service account email used by [`service_account_client`].
pub const SERVICE_ACCOUNT: &str = "orders-bot@storefront.iam.gserviceaccount.com";

const PRIVATE_KEY: &str = include_str!("fixtures/test-private-key.pem");

/// Install a log subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Clients
// =============================================================================

/// Client authenticating with a static access token against `server`.
pub fn token_client(server: &MockServer) -> SheetsClient {
    init_tracing();
    let config = SheetsConfig::new(SPREADSHEET_ID, Credentials::AccessToken(ACCESS_TOKEN.into()))
        .with_api_base_url(server.uri());
    SheetsClient::new(config).unwrap()
}

/// Client minting tokens from a service account at `{server}/token`.
pub fn service_account_client(server: &MockServer) -> SheetsClient {
    init_tracing();
    let key = ServiceAccountKey {
        client_email: SERVICE_ACCOUNT.into(),
        private_key: PRIVATE_KEY.into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let config = SheetsConfig::new(SPREADSHEET_ID, Credentials::ServiceAccount(key))
        .with_api_base_url(server.uri());
    SheetsClient::new(config).unwrap()
}

// =============================================================================
// Paths
// =============================================================================

/// Request path of the values endpoint for `range`.
pub fn values_path(range: &str) -> String {
    format!("/spreadsheets/{SPREADSHEET_ID}/values/{range}")
}

/// Authorization header value for `token`.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
