//! Jellyfin / Emby API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LibraryInfo, LibraryItem, MediaServer, MediaServerError};

/// Media server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaServerConfig {
    /// Server URL (e.g., "http://localhost:8096").
    pub url: String,
    pub api_key: String,
    /// Item types to fetch, e.g. `["Movie"]`.
    #[serde(default = "default_item_types")]
    pub item_types: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_item_types() -> Vec<String> {
    vec!["Movie".to_string()]
}

fn default_timeout() -> u32 {
    30
}

/// Jellyfin/Emby client authenticated with an API key.
pub struct JellyfinClient {
    client: Client,
    base_url: String,
    api_key: String,
    item_types: Vec<String>,
}

impl JellyfinClient {
    pub fn new(config: &MediaServerConfig) -> Result<Self, MediaServerError> {
        if config.api_key.is_empty() {
            return Err(MediaServerError::NotConfigured(
                "media_server.api_key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            item_types: config.item_types.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MediaServerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-Emby-Token", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaServerError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MediaServerError::ParseError(format!("{}: {}", path, e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ItemDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    sort_name: Option<String>,
    #[serde(default, rename = "Type")]
    item_type: String,
}

impl From<ItemDto> for LibraryItem {
    fn from(dto: ItemDto) -> Self {
        LibraryItem {
            id: dto.id,
            name: dto.name,
            original_title: dto.original_title.filter(|s| !s.is_empty()),
            sort_name: dto.sort_name.filter(|s| !s.is_empty()),
            item_type: dto.item_type,
        }
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    fn name(&self) -> &str {
        "jellyfin"
    }

    async fn list_libraries(&self) -> Result<Vec<LibraryInfo>, MediaServerError> {
        let response: ItemsResponse = self.get("/Library/MediaFolders", &[]).await?;
        Ok(response
            .items
            .into_iter()
            .map(|dto| LibraryInfo {
                id: dto.id,
                name: dto.name,
            })
            .collect())
    }

    async fn list_items_recursive(
        &self,
        library_id: &str,
    ) -> Result<Vec<LibraryItem>, MediaServerError> {
        let mut query = vec![
            ("ParentId", library_id.to_string()),
            ("Recursive", "true".to_string()),
            ("Fields", "OriginalTitle,SortName".to_string()),
        ];
        if !self.item_types.is_empty() {
            query.push(("IncludeItemTypes", self.item_types.join(",")));
        }

        let response: ItemsResponse = self.get("/Items", &query).await?;
        debug!(library_id = %library_id, items = response.items.len(), "Fetched library items");

        Ok(response.items.into_iter().map(LibraryItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_response_parsing() {
        let json = r#"{
            "Items": [
                {"Id": "1", "Name": "ABC-123 Some Title", "OriginalTitle": "", "SortName": "abc-123", "Type": "Movie"},
                {"Id": "2", "Name": "Other", "Type": "Movie"}
            ],
            "TotalRecordCount": 2
        }"#;
        let response: ItemsResponse = serde_json::from_str(json).unwrap();
        let items: Vec<LibraryItem> = response.items.into_iter().map(LibraryItem::from).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].original_title, None);
        assert_eq!(items[0].sort_name.as_deref(), Some("abc-123"));
        assert_eq!(items[0].names().count(), 2);
        assert_eq!(items[1].item_type, "Movie");
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = JellyfinClient::new(&MediaServerConfig {
            url: "http://jellyfin:8096".to_string(),
            api_key: String::new(),
            item_types: default_item_types(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(MediaServerError::NotConfigured(_))));
    }
}
