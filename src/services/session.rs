//! Session provider for the Diigo interaction API.
//!
//! The interaction API only answers requests carrying the cookies of a logged-in
//! browser session. Logging in happens outside this tool; the resulting cookies
//! are exported to a YAML file which this module reads.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::types::errors::SourceError;

/// One browser cookie as exported after login.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

/// An authenticated request context for the interaction API.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    cookies: Vec<SessionCookie>,
}

impl Session {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// Value for the `Cookie` request header. Cookies for other domains are left out.
    pub fn cookie_header(&self) -> Zeroizing<String> {
        Zeroizing::new(
            self.cookies
                .iter()
                .filter(|c| c.domain.is_empty() || c.domain.trim_start_matches('.').ends_with("diigo.com"))
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Produces an authenticated session or fails.
pub trait SessionProviderTrait {
    /// Returns a session. `force` discards any cached session first.
    fn authenticate(&mut self, force: bool) -> Result<Session, SourceError>;
}

/// Reads session cookies from a YAML file.
pub struct CookieFileSession {
    path: PathBuf,
    cached: Option<Session>,
}

impl CookieFileSession {
    pub fn new(path: PathBuf) -> Self {
        Self { path, cached: None }
    }

    /// Parses the cookie list written after an interactive login.
    pub fn parse(yaml: &str) -> Result<Session, SourceError> {
        let cookies: Vec<SessionCookie> = serde_yaml::from_str(yaml)
            .map_err(|e| SourceError::Api(format!("Invalid session file: {}", e)))?;
        if cookies.is_empty() {
            return Err(SourceError::AuthMissing("session file holds no cookies".to_string()));
        }
        Ok(Session::new(cookies))
    }
}

impl SessionProviderTrait for CookieFileSession {
    fn authenticate(&mut self, force: bool) -> Result<Session, SourceError> {
        if !force {
            if let Some(session) = &self.cached {
                return Ok(session.clone());
            }
        }
        if !self.path.exists() {
            return Err(SourceError::NotFound(self.path.display().to_string()));
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| SourceError::Api(format!("Failed to read session file: {}", e)))?;
        let session = Self::parse(&content)?;
        tracing::debug!(path = %self.path.display(), cookies = session.cookies().len(), "loaded session cookies");
        self.cached = Some(session.clone());
        Ok(session)
    }
}
