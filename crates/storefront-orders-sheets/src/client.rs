//! Google Sheets v4 values API client.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storefront_orders_store::{GatewayError, Result, Row, SheetsGateway};

use crate::auth::TokenProvider;
use crate::config::SheetsConfig;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    major_dimension: &'static str,
    values: [&'a [String]; 1],
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Spreadsheet gateway backed by the Google Sheets REST API.
#[derive(Debug)]
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
}

impl SheetsClient {
    /// Create a client for the configured spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: SheetsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            GatewayError::Configuration(format!("invalid API base URL {}: {e}", config.api_base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Configuration(format!(
                "invalid API base URL {}",
                config.api_base_url
            )));
        }

        Ok(Self {
            tokens: TokenProvider::new(client.clone(), config.credentials),
            client,
            base_url,
            spreadsheet_id: config.spreadsheet_id,
        })
    }

    /// `{base}/spreadsheets/{id}/values/{range}` with the range as one segment.
    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Configuration("API base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&ValueRangeBody<'_>>,
    ) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Try to parse error response
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("HTTP {status}"),
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.tokens.invalidate().await;
                Err(GatewayError::Auth(message))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(GatewayError::RateLimited(message)),
            _ => Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl SheetsGateway for SheetsClient {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Row>> {
        let mut url = self.values_url(&quote_sheet(sheet))?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");

        let response = self.send(Method::GET, url, None).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("unreadable values response: {e}")))?;

        tracing::debug!(sheet, rows = range.values.len(), "read sheet");
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn append_row(&self, sheet: &str, row: Row) -> Result<()> {
        let mut url = self.values_url(&format!("{}:append", quote_sheet(sheet)))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = ValueRangeBody {
            major_dimension: "ROWS",
            values: [row.as_slice()],
        };
        self.send(Method::POST, url, Some(&body)).await?;
        tracing::debug!(sheet, "appended row");
        Ok(())
    }

    async fn update_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<()> {
        if row_number == 0 {
            return Err(GatewayError::Malformed("row numbers start at 1".into()));
        }
        let mut url = self.values_url(&format!("{}!A{row_number}", quote_sheet(sheet)))?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = ValueRangeBody {
            major_dimension: "ROWS",
            values: [row.as_slice()],
        };
        self.send(Method::PUT, url, Some(&body)).await?;
        tracing::debug!(sheet, row_number, "updated row");
        Ok(())
    }
}

/// Sheet name as an A1 range prefix, quoted unless it is a plain identifier.
fn quote_sheet(sheet: &str) -> String {
    if !sheet.is_empty() && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
