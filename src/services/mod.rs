// ncdbookmarks services
// Services talk to the outside world (Diigo, Nextcloud, Ollama, config files) or
// provide shared helpers: normalization, retry, progress output.

pub mod config_store;
pub mod destination_client;
pub mod normalizer;
pub mod progress;
pub mod retry;
pub mod session;
pub mod source_client;
pub mod summarizer;
