//! Diigo client.
//!
//! Two access paths:
//! - the documented API (`/api/v2/bookmarks`): basic auth plus API key, strict
//!   per-call rate limits, always available;
//! - the interaction API used by the Diigo web client: session cookies, bulk
//!   operations, answers `403 Forbidden` unpredictably.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::services::session::{Session, SessionProviderTrait};
use crate::types::bookmark::{BookmarkRecord, LinkId, SortKey, SourceItem, Visibility};
use crate::types::config::DiigoCredentials;
use crate::types::errors::SourceError;

pub const DOCUMENTED_API_URL: &str = "https://secure.diigo.com/api/v2/bookmarks";
pub const INTERACT_API_URL: &str = "https://www.diigo.com/interact_api";
const SAVE_ITEM_URL: &str = "https://www.diigo.com/item/save/bookmark";
const BULK_DELETE_URL: &str = "https://www.diigo.com/ditem_mana2/delete_b";
const CONVERT_MODE_URL: &str = "https://www.diigo.com/ditem_mana2/convert_mode";
const WEB_ORIGIN: &str = "https://www.diigo.com";

/// The interaction API rejects clients that do not look like a browser.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(50);

/// Bookmark write through the documented API. `(url, title)` identifies the bookmark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkWrite {
    pub title: String,
    pub url: String,
    pub shared: bool,
    /// Comma-separated.
    pub tags: String,
    pub description: String,
    pub read_later: bool,
    /// Append to an existing bookmark instead of overwriting it.
    pub merge: bool,
}

impl BookmarkWrite {
    /// Write for a record read back from a Diigo dump. Existing bookmarks are merged.
    pub fn from_record(record: &BookmarkRecord) -> Self {
        Self {
            title: record.title.clone(),
            url: record.url.clone(),
            // Raw Diigo flag: true means public
            shared: record.private,
            tags: record.tags.iter().filter(|t| !t.is_empty()).cloned().collect::<Vec<_>>().join(","),
            description: record.description.clone(),
            read_later: record.unread,
            merge: true,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("title", self.title.clone()),
            ("url", self.url.clone()),
            ("shared", yes_no(self.shared).to_string()),
            ("tags", self.tags.clone()),
            ("desc", self.description.clone()),
            ("readLater", yes_no(self.read_later).to_string()),
            ("merge", yes_no(self.merge).to_string()),
        ]
    }
}

/// Item update through the interaction API. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub url: String,
    pub title: String,
    pub description: String,
    pub new_url: Option<String>,
    pub private: Option<bool>,
    pub unread: Option<bool>,
    pub link_ids: Vec<LinkId>,
}

impl ItemUpdate {
    /// Update that only flips an existing item to private.
    pub fn make_private(item: &SourceItem) -> Self {
        Self {
            url: item.url.clone(),
            title: item.title.clone(),
            private: Some(true),
            link_ids: item.link_id.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("url", self.url.clone())];
        if !self.link_ids.is_empty() {
            params.push(("link_id", join_ids(&self.link_ids)));
        }
        if !self.title.is_empty() {
            params.push(("title", self.title.clone()));
        }
        if !self.description.is_empty() {
            params.push(("description", self.description.clone()));
        }
        if let Some(new_url) = &self.new_url {
            params.push(("new_url", new_url.clone()));
        }
        if let Some(private) = self.private {
            params.push(("private", private.to_string()));
        }
        if let Some(unread) = self.unread {
            params.push(("unread", unread.to_string()));
        }
        params
    }
}

/// Trait defining the Diigo operations the batch jobs use.
pub trait SourceClientTrait {
    /// Lists one page of the interaction API. `AuthExpired` if the session is gone.
    fn list_page(&mut self, page: u32, size: u32, sort: SortKey) -> Result<Vec<SourceItem>, SourceError>;
    /// Full-text search over the user's items.
    fn search(&mut self, what: &str, page: u32, size: u32) -> Result<Vec<SourceItem>, SourceError>;
    /// Lists bookmarks through the documented API, oldest offset first.
    fn list_documented(&mut self, start: u32, count: u32) -> Result<Vec<SourceItem>, SourceError>;
    /// Creates or overwrites one bookmark through the documented API.
    fn write_one(&mut self, write: &BookmarkWrite) -> Result<(), SourceError>;
    /// Updates one item through the interaction API.
    fn update_item(&mut self, update: &ItemUpdate) -> Result<(), SourceError>;
    /// Bulk delete. Expect `Forbidden`.
    fn delete_many(&mut self, ids: &[LinkId]) -> Result<(), SourceError>;
    /// Deletes one bookmark by `(url, title)` through the documented API.
    fn delete_one(&mut self, item: &SourceItem) -> Result<(), SourceError>;
    /// Bulk visibility change. Expect `Forbidden`.
    fn set_visibility(&mut self, ids: &[LinkId], visibility: Visibility) -> Result<(), SourceError>;
    /// Re-establishes the interaction API session.
    fn reauthenticate(&mut self, force: bool) -> Result<(), SourceError>;

    /// Ids of the items matching a search.
    fn find_ids(&mut self, what: &str, page: u32, size: u32) -> Result<Vec<LinkId>, SourceError> {
        Ok(self
            .search(what, page, size)?
            .iter()
            .filter_map(|item| item.link_id)
            .collect())
    }
}

/// Fails with `AuthMissing` if any credential is blank.
pub fn check_credentials(credentials: &DiigoCredentials) -> Result<(), SourceError> {
    if credentials.user.trim().is_empty() {
        return Err(SourceError::AuthMissing("no Diigo user configured".to_string()));
    }
    if credentials.apikey.trim().is_empty() {
        return Err(SourceError::AuthMissing("no Diigo API key configured".to_string()));
    }
    if credentials.password.trim().is_empty() {
        return Err(SourceError::AuthMissing("no Diigo password configured".to_string()));
    }
    Ok(())
}

/// Maps an HTTP status to the error taxonomy.
///
/// Diigo answers `400` when it is overloaded, so it counts as transient.
pub fn check_status(status: u16, body: &str) -> Result<(), SourceError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(SourceError::AuthExpired),
        403 => Err(SourceError::Forbidden),
        404 => Err(SourceError::NotFound(truncate(body))),
        400 | 429 | 500..=599 => Err(SourceError::Transient(format!("status {}: {}", status, truncate(body)))),
        _ => Err(SourceError::Api(format!("status {}: {}", status, truncate(body)))),
    }
}

/// Parses an interaction API listing. A body that is not JSON is the login page.
pub fn parse_items(body: &str) -> Result<Vec<SourceItem>, SourceError> {
    let value: Value = serde_json::from_str(body).map_err(|_| SourceError::AuthExpired)?;
    let items = value
        .get("items")
        .cloned()
        .ok_or_else(|| SourceError::Transient("response carries no items".to_string()))?;
    serde_json::from_value(items)
        .map_err(|e| SourceError::Api(format!("Unexpected item format: {}", e)))
}

/// Checks the answer of a bulk action (`delete_b`, `convert_mode`). Both answer
/// JSON; anything else is the login page served with status 200.
pub fn check_action(body: &str) -> Result<(), SourceError> {
    serde_json::from_str::<Value>(body)
        .map(|_| ())
        .map_err(|_| SourceError::AuthExpired)
}

/// Parses a documented API listing.
pub fn parse_bookmarks(body: &str) -> Result<Vec<SourceItem>, SourceError> {
    serde_json::from_str(body)
        .map_err(|e| SourceError::Transient(format!("Unparseable bookmark list: {}", e)))
}

pub fn join_ids(ids: &[LinkId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

fn transport(e: reqwest::Error) -> SourceError {
    SourceError::Transient(e.to_string())
}

/// Diigo client over both APIs.
pub struct DiigoClient {
    http: Client,
    user: Zeroizing<String>,
    password: Zeroizing<String>,
    apikey: Zeroizing<String>,
    sessions: Box<dyn SessionProviderTrait>,
    session: Option<Session>,
}

impl DiigoClient {
    pub fn new(
        credentials: &DiigoCredentials,
        sessions: Box<dyn SessionProviderTrait>,
    ) -> Result<Self, SourceError> {
        check_credentials(credentials)?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Api(e.to_string()))?;
        Ok(Self {
            http,
            user: Zeroizing::new(credentials.user.clone()),
            password: Zeroizing::new(credentials.password.clone()),
            apikey: Zeroizing::new(credentials.apikey.clone()),
            sessions,
            session: None,
        })
    }

    fn cookie_header(&mut self) -> Result<Zeroizing<String>, SourceError> {
        if self.session.is_none() {
            self.session = Some(self.sessions.authenticate(false)?);
        }
        match &self.session {
            Some(session) => Ok(session.cookie_header()),
            None => Err(SourceError::AuthExpired),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(self.user.as_str(), Some(self.password.as_str()))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, BROWSER_USER_AGENT)
    }

    fn web_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ORIGIN, WEB_ORIGIN)
            .header(REFERER, format!("{}/user/{}", WEB_ORIGIN, self.user.as_str()))
    }

    fn key_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.apikey.as_str().to_string()),
            ("user", self.user.as_str().to_string()),
        ]
    }

    fn execute(request: RequestBuilder) -> Result<String, SourceError> {
        let response = request.send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport)?;
        check_status(status, &body)?;
        Ok(body)
    }

    fn interact_get(&mut self, endpoint: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let cookie = self.cookie_header()?;
        let request = self
            .authorized(self.http.get(format!("{}/{}", INTERACT_API_URL, endpoint)))
            .header(COOKIE, cookie.as_str())
            .query(params);
        Self::execute(request)
    }

    fn interact_post(&mut self, url: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let cookie = self.cookie_header()?;
        let request = self
            .web_headers(self.authorized(self.http.post(url)))
            .header(COOKIE, cookie.as_str())
            .query(params);
        Self::execute(request)
    }
}

impl SourceClientTrait for DiigoClient {
    fn list_page(&mut self, page: u32, size: u32, sort: SortKey) -> Result<Vec<SourceItem>, SourceError> {
        let params = [
            ("page_num", page.to_string()),
            ("sort", sort.as_str().to_string()),
            ("count", size.to_string()),
        ];
        let body = self.interact_get("load_user_items", &params)?;
        let items = parse_items(&body)?;
        tracing::debug!(page, count = items.len(), "loaded Diigo page");
        Ok(items)
    }

    fn search(&mut self, what: &str, page: u32, size: u32) -> Result<Vec<SourceItem>, SourceError> {
        let params = [
            ("what", what.to_string()),
            ("page_num", page.to_string()),
            ("sort", SortKey::Updated.as_str().to_string()),
            ("count", size.to_string()),
        ];
        let body = self.interact_get("search_user_items", &params)?;
        parse_items(&body)
    }

    fn list_documented(&mut self, start: u32, count: u32) -> Result<Vec<SourceItem>, SourceError> {
        let mut params = self.key_params();
        params.push(("start", start.to_string()));
        params.push(("count", count.to_string()));
        let request = self.authorized(self.http.get(DOCUMENTED_API_URL)).query(&params);
        parse_bookmarks(&Self::execute(request)?)
    }

    fn write_one(&mut self, write: &BookmarkWrite) -> Result<(), SourceError> {
        let mut params = self.key_params();
        params.extend(write.params());
        let request = self.authorized(self.http.post(DOCUMENTED_API_URL)).query(&params);
        Self::execute(request)?;
        tracing::debug!(url = %write.url, "wrote Diigo bookmark");
        Ok(())
    }

    fn update_item(&mut self, update: &ItemUpdate) -> Result<(), SourceError> {
        // The endpoint answers 200 with an HTML body on success
        self.interact_post(SAVE_ITEM_URL, &update.params())?;
        Ok(())
    }

    fn delete_many(&mut self, ids: &[LinkId]) -> Result<(), SourceError> {
        let body = self.interact_post(BULK_DELETE_URL, &[("link_id", join_ids(ids))])?;
        check_action(&body)?;
        tracing::debug!(count = ids.len(), "bulk-deleted Diigo items");
        Ok(())
    }

    fn delete_one(&mut self, item: &SourceItem) -> Result<(), SourceError> {
        let mut params = self.key_params();
        params.push(("title", item.title.clone()));
        params.push(("url", item.url.clone()));
        let request = self.authorized(self.http.delete(DOCUMENTED_API_URL)).query(&params);
        Self::execute(request)?;
        Ok(())
    }

    fn set_visibility(&mut self, ids: &[LinkId], visibility: Visibility) -> Result<(), SourceError> {
        let params = [
            ("link_id", join_ids(ids)),
            ("mode", visibility.mode().to_string()),
        ];
        let body = self.interact_post(CONVERT_MODE_URL, &params)?;
        check_action(&body)
    }

    fn reauthenticate(&mut self, force: bool) -> Result<(), SourceError> {
        tracing::info!(force, "re-authenticating Diigo session");
        self.session = Some(self.sessions.authenticate(force)?);
        Ok(())
    }
}
