//! Google Sheets API client.

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use stocksheet_common::{Error, Result};

use super::drive::handle_response;

/// Google Sheets API base URL.
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Grid dimensions of a sheet tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    /// Number of rows.
    pub row_count: i64,
    /// Number of columns.
    pub column_count: i64,
}

/// Presentation color of a sheet tab, RGB in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

/// Properties of one sheet tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    /// Sheet ID, assigned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,
    /// Tab title.
    pub title: String,
    /// Tab position within the spreadsheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    /// Grid dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridProperties>,
    /// Tab color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<TabColor>,
}

#[derive(Debug, Clone, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

/// A spreadsheet with its nested sheet list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    /// Spreadsheet ID.
    pub spreadsheet_id: String,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

impl Spreadsheet {
    /// Properties of every sheet tab, in listing order.
    pub fn sheet_properties(&self) -> impl Iterator<Item = &SheetProperties> {
        self.sheets.iter().map(|sheet| &sheet.properties)
    }

    /// Find a sheet tab by its exact title.
    pub fn find_sheet(&self, title: &str) -> Option<&SheetProperties> {
        self.sheet_properties()
            .find(|properties| properties.title == title)
    }
}

/// A rectangular block of cell values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// A1 range the values cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// ROWS or COLUMNS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    /// Cell values, row-major.
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Summary returned by a values update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: Option<i64>,
    #[serde(default)]
    pub updated_columns: Option<i64>,
    #[serde(default)]
    pub updated_cells: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

/// Google Sheets API client.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl SheetsClient {
    /// Create a new Sheets client using a bearer access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, SHEETS_API_BASE)
    }

    /// Create a client against a non-default API base, e.g. a test server.
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("stocksheet/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Get a spreadsheet's properties, including its nested sheet list.
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet> {
        let url = format!("{}/spreadsheets/{}", self.base_url, spreadsheet_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "spreadsheetId,sheets.properties")])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to get spreadsheet: {}", e)))?;

        handle_response(response).await
    }

    /// Add a sheet tab via a `batchUpdate` with one `addSheet` request.
    ///
    /// Returns the created tab's properties as reported by the service,
    /// with its assigned sheet ID.
    pub async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        properties: &SheetProperties,
    ) -> Result<SheetProperties> {
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.base_url, spreadsheet_id
        );
        let body = serde_json::json!({
            "requests": [
                { "addSheet": { "properties": properties } }
            ]
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to add sheet: {}", e)))?;

        let reply: serde_json::Value = handle_response(response).await?;
        let created = reply
            .pointer("/replies/0/addSheet/properties")
            .ok_or_else(|| {
                Error::Remote("batchUpdate reply missing addSheet properties".to_string())
            })?;

        serde_json::from_value(created.clone())
            .map_err(|e| Error::Serialization(format!("Malformed addSheet reply: {}", e)))
    }

    /// Write rows into a range with RAW value input.
    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<serde_json::Value>],
    ) -> Result<UpdateSummary> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url, spreadsheet_id, range
        );
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: rows.to_vec(),
        };

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to update values: {}", e)))?;

        handle_response(response).await
    }

    /// Read one or more ranges with unformatted values.
    pub async fn batch_get_values(
        &self,
        spreadsheet_id: &str,
        ranges: &[String],
    ) -> Result<Vec<ValueRange>> {
        let url = format!(
            "{}/spreadsheets/{}/values:batchGet",
            self.base_url, spreadsheet_id
        );

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("dateTimeRenderOption", "FORMATTED_STRING"),
            ]);
        for range in ranges {
            request = request.query(&[("ranges", range.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read values: {}", e)))?;

        let batch: BatchGetResponse = handle_response(response).await?;
        Ok(batch.value_ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sheet_properties_skip_unset_fields_on_serialize() {
        let properties = SheetProperties {
            sheet_id: None,
            title: "Daily".to_string(),
            index: Some(0),
            grid_properties: Some(GridProperties {
                row_count: 20,
                column_count: 12,
            }),
            tab_color: None,
        };

        let value = serde_json::to_value(&properties).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Daily",
                "index": 0,
                "gridProperties": { "rowCount": 20, "columnCount": 12 }
            })
        );
    }

    #[test]
    fn test_spreadsheet_find_sheet_by_title() {
        let raw = r#"{
            "spreadsheetId": "ss-1",
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Summary", "index": 0 } },
                { "properties": {
                    "sheetId": 77, "title": "Daily", "index": 1,
                    "gridProperties": { "rowCount": 9, "columnCount": 4 }
                } }
            ]
        }"#;

        let spreadsheet: Spreadsheet = serde_json::from_str(raw).unwrap();
        let daily = spreadsheet.find_sheet("Daily").unwrap();
        assert_eq!(daily.sheet_id, Some(77));
        assert_eq!(
            daily.grid_properties,
            Some(GridProperties {
                row_count: 9,
                column_count: 4
            })
        );
        assert!(spreadsheet.find_sheet("Weekly").is_none());
    }

    #[test]
    fn test_value_range_tolerates_missing_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range": "Daily!A1:B2"}"#).unwrap();
        assert!(range.values.is_empty());
    }

    #[test]
    fn test_tab_color_round_trip() {
        let color = TabColor {
            red: 1.0,
            green: 0.3,
            blue: 0.4,
        };
        let value = serde_json::to_value(color).unwrap();
        assert_eq!(value, json!({ "red": 1.0, "green": 0.3, "blue": 0.4 }));
    }
}
