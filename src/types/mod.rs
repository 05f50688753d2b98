// Shared type definitions
// Plain data used across clients, the CSV store and the batch engines.

pub mod bookmark;
pub mod config;
pub mod description;
pub mod errors;
