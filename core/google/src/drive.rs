//! Google Drive API client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use stocksheet_common::{Error, Result};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type marking a Drive folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// MIME type marking a Drive-hosted spreadsheet.
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Field projection requested on every file-returning call.
const FILE_FIELDS: &str = "id,name,mimeType,createdTime,parents";

/// Google Drive file metadata from the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Created time.
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Check if this is a spreadsheet.
    pub fn is_spreadsheet(&self) -> bool {
        self.mime_type == SPREADSHEET_MIME_TYPE
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Create a new Drive client using a bearer access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DRIVE_API_BASE)
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

    /// List files matching a Drive query, following pagination.
    pub async fn list_files(&self, query: Option<&str>) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = format!("{}/files", self.base_url);
            let fields = format!("files({}),nextPageToken", FILE_FIELDS);

            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("fields", fields.as_str()), ("pageSize", "1000")]);

            if let Some(query) = query {
                request = request.query(&[("q", query)]);
            }
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Transport(format!("Failed to list files: {}", e)))?;

            let list_response: FileListResponse = handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// List the direct, non-trashed children of a folder.
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "'{}' in parents and trashed = false",
            folder_id.replace('\'', "\\'")
        );
        self.list_files(Some(&query)).await
    }

    /// Create a folder.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        self.create_file(&metadata, "Failed to create folder").await
    }

    /// Create a spreadsheet file under a folder.
    pub async fn create_spreadsheet(
        &self,
        name: &str,
        parent_id: &str,
        description: Option<&str>,
    ) -> Result<DriveFile> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": SPREADSHEET_MIME_TYPE,
            "parents": [parent_id],
        });
        if let Some(description) = description {
            metadata["description"] = serde_json::json!(description);
        }

        self.create_file(&metadata, "Failed to create spreadsheet")
            .await
    }

    async fn create_file(&self, metadata: &serde_json::Value, context: &str) -> Result<DriveFile> {
        let url = format!("{}/files", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", FILE_FIELDS)])
            .json(metadata)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", context, e)))?;

        handle_response(response).await
    }
}

/// Handle an API response, mapping error statuses onto the error taxonomy.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))
    } else if status == StatusCode::UNAUTHORIZED {
        Err(Error::Authorization(
            "Invalid or expired token".to_string(),
        ))
    } else if status == StatusCode::FORBIDDEN {
        Err(Error::NotPermitted("Access denied".to_string()))
    } else if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound("Resource not found".to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::Remote(format!("API error: {} - {}", status, body)))
    }
}
