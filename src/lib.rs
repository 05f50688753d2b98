//! ncdbookmarks: exports Diigo bookmarks to CSV, recreates them in Nextcloud
//! Bookmarks and removes them from Diigo.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod services;
pub mod types;
