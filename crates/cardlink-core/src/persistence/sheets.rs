//! Google Sheets row store over the v4 REST API.
//!
//! Authentication is a bearer token supplied by the operator; minting and
//! refreshing it happens outside this process.

use super::{PersistenceGateway, RowPosition};
use crate::config::{column_letter, AppConfig, SheetConfig};
use crate::error::{CardlinkError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Registration rows in one worksheet of a Google spreadsheet.
pub struct SheetsRowStore {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
}

impl SheetsRowStore {
    /// Create a store for `worksheet` inside `spreadsheet_id`.
    pub fn new(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(SheetConfig::REQUEST_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| CardlinkError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        let base_url = Url::parse(SheetConfig::SHEETS_API_BASE).map_err(|e| CardlinkError::Config {
            message: format!("Invalid Sheets API base URL: {}", e),
        })?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            access_token: access_token.into(),
        })
    }

    /// Point the store at a different API root (proxies, test doubles).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url).map_err(|e| CardlinkError::Config {
            message: format!("Invalid Sheets API base URL '{}': {}", base_url, e),
        })?;
        Ok(self)
    }

    /// Worksheet name in A1 notation, quoted when it has anything but letters and digits.
    fn sheet_prefix(&self) -> String {
        if self.worksheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.worksheet.clone()
        } else {
            format!("'{}'", self.worksheet.replace('\'', "''"))
        }
    }

    fn cell_range(&self, position: RowPosition, column: u32) -> Result<String> {
        let letter = column_letter(column).ok_or_else(|| {
            CardlinkError::write_failed(format!("column {} has no sheet letter", column))
        })?;
        Ok(format!("{}!{}{}", self.sheet_prefix(), letter, position.row()))
    }

    fn values_url(&self, range_segment: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CardlinkError::Config {
                message: format!("Sheets API base URL cannot hold a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range_segment);
        Ok(url)
    }

    /// Send an authorized request and decode the JSON body.
    async fn send<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Sheets API rejected credentials ({})", status);
            return Err(CardlinkError::unavailable(format!(
                "Sheets API rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CardlinkError::write_failed(format!(
                "Sheets API returned {}: {}",
                status, body
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Unexpected Sheets API response: {}", e);
            CardlinkError::from(e)
        })
    }
}

/// Extract the first row number of an A1 range such as `Students!A5:D5`.
pub fn parse_updated_range(range: &str) -> Option<RowPosition> {
    let cells = range.rsplit_once('!').map(|(_, cells)| cells).unwrap_or(range);
    let first = cells.split(':').next()?;
    let digits: String = first
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .collect();
    digits.parse::<u32>().ok().filter(|row| *row > 0).map(RowPosition)
}

#[async_trait]
impl PersistenceGateway for SheetsRowStore {
    async fn append(&self, cells: &[String]) -> Result<RowPosition> {
        let last = column_letter(SheetConfig::COLUMN_COUNT).unwrap_or('D');
        let range = format!("{}!A:{}", self.sheet_prefix(), last);
        let mut url = self.values_url(&format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({ "values": [cells] });
        let response: AppendResponse = self.send(self.client.post(url).json(&body)).await?;

        let position = parse_updated_range(&response.updates.updated_range).ok_or_else(|| {
            CardlinkError::write_failed(format!(
                "Could not determine appended row from range '{}'",
                response.updates.updated_range
            ))
        })?;
        debug!(row = position.row(), range = %response.updates.updated_range, "Appended row to sheet");
        Ok(position)
    }

    async fn update(&self, position: RowPosition, column: u32, value: &str) -> Result<()> {
        let range = self.cell_range(position, column)?;
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = json!({ "range": range, "values": [[value]] });
        let _: serde_json::Value = self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn read(&self, position: RowPosition, column: u32) -> Result<String> {
        let range = self.cell_range(position, column)?;
        let url = self.values_url(&range)?;

        let values: ValueRange = self.send(self.client.get(url)).await?;
        Ok(values
            .values
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "sheets"
    }
}
