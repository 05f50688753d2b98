//! Nextcloud Bookmarks client (REST API v2).
//!
//! Every response is wrapped in `{"status": "success"|"error", "data"|"item": ...}`.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::types::bookmark::{BookmarkFields, DestinationBookmark, FolderId, FolderRef, RemoteId};
use crate::types::config::NextcloudCredentials;
use crate::types::errors::DestinationError;

const API_PATH: &str = "index.php/apps/bookmarks/public/rest/v2";
const ROOT_FOLDER: FolderId = -1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(50);
const CLIENT_USER_AGENT: &str = concat!("ncdbookmarks/", env!("CARGO_PKG_VERSION"));

/// Trait defining Nextcloud Bookmarks operations.
pub trait DestinationClientTrait {
    /// Bookmarks stored under `url`, optionally restricted to one folder.
    fn find_by_url(&mut self, url: &str, folder: Option<FolderId>) -> Result<Vec<DestinationBookmark>, DestinationError>;
    fn create(&mut self, fields: &BookmarkFields) -> Result<RemoteId, DestinationError>;
    fn update(&mut self, id: RemoteId, fields: &BookmarkFields) -> Result<RemoteId, DestinationError>;
    fn list_page(&mut self, page: u32, limit: u32) -> Result<Vec<DestinationBookmark>, DestinationError>;
    /// Folder tree below the root.
    fn list_folders(&mut self) -> Result<Vec<FolderRef>, DestinationError>;
    fn create_folder(&mut self, title: &str) -> Result<FolderId, DestinationError>;

    /// Id of the top-level folder called `name`, created if absent.
    ///
    /// Folders are matched by exact title. If several share the name, the first
    /// one listed is used.
    fn get_or_create_folder(&mut self, name: &str) -> Result<FolderId, DestinationError> {
        let folders = self.list_folders()?;
        let matches: Vec<&FolderRef> = folders.iter().filter(|f| f.title == name).collect();
        if matches.len() > 1 {
            tracing::warn!(
                folder = name,
                ids = ?matches.iter().map(|f| f.id).collect::<Vec<_>>(),
                "several folders share this name, using the first"
            );
        }
        match matches.first() {
            Some(folder) => Ok(folder.id),
            None => {
                let id = self.create_folder(name)?;
                tracing::info!(folder = name, id, "created folder");
                Ok(id)
            }
        }
    }
}

/// Fails with `AuthMissing` if the user, password or instance URL is blank.
pub fn check_credentials(credentials: &NextcloudCredentials) -> Result<(), DestinationError> {
    if credentials.nc_url.trim().is_empty() {
        return Err(DestinationError::AuthMissing("no Nextcloud URL configured".to_string()));
    }
    if credentials.user.trim().is_empty() {
        return Err(DestinationError::AuthMissing("no Nextcloud user configured".to_string()));
    }
    if credentials.password.trim().is_empty() {
        return Err(DestinationError::AuthMissing("no Nextcloud password configured".to_string()));
    }
    Ok(())
}

pub fn check_status(status: u16, body: &str) -> Result<(), DestinationError> {
    let excerpt: String = body.chars().take(200).collect();
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(DestinationError::Forbidden),
        404 => Err(DestinationError::NotFound(excerpt)),
        500..=599 => Err(DestinationError::Transient(format!("status {}: {}", status, excerpt))),
        _ => Err(DestinationError::Api(format!("status {}: {}", status, excerpt))),
    }
}

/// Unwraps the `{status, <field>}` envelope and decodes `<field>`.
pub fn parse_envelope<T: DeserializeOwned>(body: &str, field: &str) -> Result<T, DestinationError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DestinationError::Transient(format!("Unparseable response: {}", e)))?;
    let status = value.get("status").and_then(Value::as_str).unwrap_or("");
    if status != "success" {
        let message = value
            .get("data")
            .map(|d| d.to_string())
            .unwrap_or_else(|| status.to_string());
        return Err(DestinationError::Api(format!("request failed: {}", message)));
    }
    let payload = value
        .get(field)
        .cloned()
        .ok_or_else(|| DestinationError::Api(format!("response carries no '{}'", field)))?;
    serde_json::from_value(payload)
        .map_err(|e| DestinationError::Api(format!("Unexpected '{}' format: {}", field, e)))
}

/// Id of the `item` in a create/update response.
pub fn parse_item_id(body: &str) -> Result<i64, DestinationError> {
    let item: Value = parse_envelope(body, "item")?;
    item.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DestinationError::Api("response item has no id".to_string()))
}

fn transport(e: reqwest::Error) -> DestinationError {
    DestinationError::Transient(e.to_string())
}

/// Nextcloud Bookmarks client using HTTP basic auth.
pub struct NextcloudClient {
    http: Client,
    base_url: String,
    user: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl NextcloudClient {
    pub fn new(credentials: &NextcloudCredentials) -> Result<Self, DestinationError> {
        check_credentials(credentials)?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DestinationError::Api(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("{}/{}", credentials.nc_url.trim_end_matches('/'), API_PATH),
            user: Zeroizing::new(credentials.user.clone()),
            password: Zeroizing::new(credentials.password.clone()),
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(self.user.as_str(), Some(self.password.as_str()))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
    }

    fn execute(&self, request: RequestBuilder) -> Result<String, DestinationError> {
        let response = self.authorized(request).send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport)?;
        check_status(status, &body)?;
        Ok(body)
    }
}

impl DestinationClientTrait for NextcloudClient {
    fn find_by_url(&mut self, url: &str, folder: Option<FolderId>) -> Result<Vec<DestinationBookmark>, DestinationError> {
        let mut params = vec![("url", url.to_string())];
        if let Some(folder) = folder {
            params.push(("folder", folder.to_string()));
        }
        let body = self.execute(self.http.get(self.url("bookmark")).query(&params))?;
        parse_envelope(&body, "data")
    }

    fn create(&mut self, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        let body = self.execute(self.http.post(self.url("bookmark")).json(fields))?;
        let id = parse_item_id(&body)?;
        tracing::debug!(url = %fields.url, id, "created bookmark");
        Ok(id)
    }

    fn update(&mut self, id: RemoteId, fields: &BookmarkFields) -> Result<RemoteId, DestinationError> {
        let body = self.execute(
            self.http
                .put(self.url(&format!("bookmark/{}", id)))
                .json(fields),
        )?;
        let id = parse_item_id(&body)?;
        tracing::debug!(url = %fields.url, id, "updated bookmark");
        Ok(id)
    }

    fn list_page(&mut self, page: u32, limit: u32) -> Result<Vec<DestinationBookmark>, DestinationError> {
        let params = [("page", page.to_string()), ("limit", limit.to_string())];
        let body = self.execute(self.http.get(self.url("bookmark")).query(&params))?;
        parse_envelope(&body, "data")
    }

    fn list_folders(&mut self) -> Result<Vec<FolderRef>, DestinationError> {
        let params = [("root", ROOT_FOLDER.to_string())];
        let body = self.execute(self.http.get(self.url("folder")).query(&params))?;
        parse_envelope(&body, "data")
    }

    fn create_folder(&mut self, title: &str) -> Result<FolderId, DestinationError> {
        let payload = json!({ "title": title, "parent_folder": ROOT_FOLDER });
        let body = self.execute(self.http.post(self.url("folder")).json(&payload))?;
        parse_item_id(&body)
    }
}
